//! Message-level building blocks shared by every hyphae crate.
//!
//! - [`Event`]: the immutable envelope moved through channels
//! - [`Tagged`] / [`MessageTag`]: sum-type payloads with a discriminant tag
//! - [`routing`]: actor and correlation identifiers for request/reply

pub mod event;
pub mod message;
pub mod routing;

pub use event::Event;
pub use message::{MessageTag, Tagged};
pub use routing::{ActorId, Correlatable, CorrelationId};
