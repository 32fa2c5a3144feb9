//! hyphae: in-process event transport and actor execution core
//!
//! Pipeline stages (market data gateways, strategies, executors) talk over
//! bounded [`EventChannel`]s and run as thread-per-actor [`Actor`]s, brought
//! up and torn down together by a [`Supervisor`].
//!
//! ```rust
//! use hyphae::prelude::*;
//! use std::time::Duration;
//!
//! message_tag! {
//!     pub enum QuoteTag {
//!         Quote => "market.quote",
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Quote {
//!     bid: f64,
//!     ask: f64,
//!     correlation: Option<CorrelationId>,
//! }
//!
//! impl_tagged!(Quote, QuoteTag, QuoteTag::Quote);
//!
//! impl Correlatable for Quote {
//!     fn correlation_id(&self) -> Option<CorrelationId> {
//!         self.correlation
//!     }
//!
//!     fn set_correlation_id(&mut self, id: CorrelationId) {
//!         self.correlation = Some(id);
//!     }
//! }
//!
//! let mut supervisor = Supervisor::new(RuntimeConfig::default());
//! let pricer = supervisor
//!     .actor_builder::<Quote>("pricer", Stage::Strategy)
//!     .handle_with(|quote: Quote, ctx| {
//!         ctx.reply_to(&quote, (quote.bid + quote.ask) / 2.0);
//!         Ok(())
//!     })
//!     .build();
//! let pricer_ref = pricer.actor_ref();
//! supervisor.add_strategy(pricer);
//!
//! supervisor.start_all().unwrap();
//! let mid: f64 = pricer_ref
//!     .ask(
//!         Quote { bid: 99.0, ask: 101.0, correlation: None },
//!         Duration::from_secs(1),
//!     )
//!     .unwrap();
//! assert_eq!(mid, 100.0);
//! supervisor.stop_all();
//! ```

pub use hyphae_config as config;
pub use hyphae_protocol as protocol;
pub use hyphae_transport as transport;

pub use hyphae_config::{ChannelConfig, ChannelKind, FullPolicy, RuntimeConfig, Stage, StageConfig};
pub use hyphae_protocol::{
    impl_tagged, message_tag, ActorId, Correlatable, CorrelationId, Event, MessageTag, Tagged,
};
pub use hyphae_transport::{
    new_channel, Actor, ActorBuilder, ActorContext, ActorError, ActorRef, ActorStatus,
    BlockingChannel, Directive, EventChannel, EventReceiver, EventSender, FailureAction,
    HandlerError, HandlerRegistry, Persistent, Persister, RingChannel, SendError, Supervisor,
};

/// Everything a pipeline stage usually needs
pub mod prelude {
    pub use hyphae_config::{RuntimeConfig, Stage};
    pub use hyphae_protocol::{
        impl_tagged, message_tag, Correlatable, CorrelationId, Event, MessageTag, Tagged,
    };
    pub use hyphae_transport::{
        Actor, ActorContext, ActorRef, Directive, EventChannel, EventReceiver, EventSender,
        HandlerError, Supervisor,
    };
}
