use hyphae_protocol::{Event, MessageTag, Tagged};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of actor operations (`tell`, `ask`, `start`)
#[derive(Error, Debug)]
pub enum ActorError {
    #[error("Actor is not running")]
    NotRunning,

    #[error("Actor already stopped (stopped actors must be rebuilt)")]
    AlreadyStopped,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reply type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    #[error("Mailbox is full (backpressure applied)")]
    MailboxFull,

    #[error("Failed to spawn run loop thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors raised while handling a message inside a run loop.
///
/// None of these unwind the run loop by themselves: they are routed to the
/// actor's error handler, whose directive decides what happens next.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No handler registered for tag '{tag}'")]
    HandlerNotFound { tag: &'static str },

    #[error("Handler failed: {0}")]
    Failed(#[from] anyhow::Error),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] crate::actor::PersistError),
}

impl HandlerError {
    /// Errors the run loop always recovers from, whatever the error handler says
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HandlerError::HandlerNotFound { .. } | HandlerError::Persistence(_)
        )
    }
}

/// A rejected send, handing the event back to the caller
#[derive(Error)]
pub enum SendError<T: Tagged> {
    #[error("Channel is full (backpressure applied)")]
    Full(Event<T>),

    #[error("Channel is closed")]
    Closed(Event<T>),
}

impl<T: Tagged> SendError<T> {
    /// Recover the event that could not be sent
    pub fn into_event(self) -> Event<T> {
        match self {
            SendError::Full(event) | SendError::Closed(event) => event,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, SendError::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SendError::Closed(_))
    }
}

impl<T: Tagged> std::fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Full(event) => write!(f, "Full({})", event.tag().as_str()),
            SendError::Closed(event) => write!(f, "Closed({})", event.tag().as_str()),
        }
    }
}

/// Errors from supervisor lifecycle operations
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to start actor {actor}: {source}")]
    StartFailed {
        actor: String,
        #[source]
        source: ActorError,
    },

    #[error("Failed to spawn failure monitor thread: {0}")]
    Monitor(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ActorError>;
