pub mod actor;
pub mod channel;
pub mod error;
pub mod handler;
pub mod supervisor;

pub use actor::{
    Actor, ActorBuilder, ActorContext, ActorFailure, ActorMetrics, ActorRef, ActorStatus,
    Directive, ErrorHandler, FailureSink, FnHandler, LifecycleHook, MemoryPersister,
    MessageHandler, PersistError, Persistent, Persister, ResumeOnError,
};
pub use channel::{
    describe, new_channel, Backoff, BlockingChannel, ChannelMetrics, EventChannel, EventReceiver,
    EventSender, MetricsSnapshot, RingChannel, RingConsumer, RingProducer,
};
pub use error::{ActorError, HandlerError, Result, SendError, SupervisorError};
pub use handler::{HandlerFn, HandlerRegistry};
pub use supervisor::{FailureAction, Supervised, Supervisor};
