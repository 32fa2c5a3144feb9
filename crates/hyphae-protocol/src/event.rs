use crate::message::Tagged;
use std::time::{Duration, Instant};

/// Immutable envelope moved through an event channel.
///
/// The tag is computed from the payload when the event is built and never
/// changes afterwards. Events are moved, not cloned: a successfully sent event
/// is owned by the channel until exactly one consumer takes it.
pub struct Event<T: Tagged> {
    tag: T::Tag,
    payload: T,
    created_at: Instant,
}

impl<T: Tagged> Event<T> {
    /// Wrap a payload, stamping its tag and creation time
    pub fn new(payload: T) -> Self {
        Self {
            tag: payload.tag(),
            payload,
            created_at: Instant::now(),
        }
    }

    /// Discriminant used for handler dispatch
    pub fn tag(&self) -> T::Tag {
        self.tag
    }

    /// Borrow the payload
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Take ownership of the payload
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// When the producer built this event
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the event was built (queueing + handling latency)
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl<T: Tagged> From<T> for Event<T> {
    fn from(payload: T) -> Self {
        Self::new(payload)
    }
}

impl<T: Tagged + std::fmt::Debug> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("tag", &self.tag)
            .field("payload", &self.payload)
            .finish()
    }
}
