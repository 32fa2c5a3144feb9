//! Thread-per-actor execution
//!
//! This module provides a lightweight actor abstraction where:
//! - Each actor owns a private mailbox (any [`EventChannel`](crate::EventChannel))
//! - A dedicated OS thread drains the mailbox through one message handler
//! - Handler errors and panics go to an error handler whose [`Directive`]
//!   decides between resuming, stopping and escalating
//! - Request/reply is supported via correlation IDs (`ask`/`reply`)
//!
//! # Example
//!
//! ```rust
//! use hyphae_protocol::{message_tag, Tagged};
//! use hyphae_transport::Actor;
//! use std::sync::mpsc;
//!
//! message_tag! {
//!     pub enum FillTag {
//!         Fill => "fill",
//!     }
//! }
//!
//! struct Fill {
//!     qty: i64,
//! }
//!
//! hyphae_protocol::impl_tagged!(Fill, FillTag, FillTag::Fill);
//!
//! let (tx, rx) = mpsc::channel();
//! let mut net = 0;
//! let actor = Actor::builder("exposure")
//!     .on(FillTag::Fill, move |fill: Fill, _ctx| {
//!         net += fill.qty;
//!         tx.send(net)?;
//!         Ok(())
//!     })
//!     .build();
//!
//! actor.start().unwrap();
//! actor.tell(Fill { qty: 5 }).unwrap();
//! actor.tell(Fill { qty: -2 }).unwrap();
//! assert_eq!(rx.recv().unwrap(), 5);
//! assert_eq!(rx.recv().unwrap(), 3);
//! actor.stop();
//! ```

mod context;
mod handle;
mod metrics;
mod pending;
mod persist;
mod runtime;
mod status;
mod supervision;

pub use context::{ActorContext, ActorRef};
pub use handle::{FnHandler, LifecycleHook, MessageHandler};
pub use metrics::ActorMetrics;
pub use persist::{MemoryPersister, PersistError, Persistent, Persister};
pub use runtime::{Actor, ActorBuilder};
pub use status::ActorStatus;
pub use supervision::{ActorFailure, Directive, ErrorHandler, FailureSink, ResumeOnError};
