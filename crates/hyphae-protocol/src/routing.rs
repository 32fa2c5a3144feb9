//! Identifiers for actor addressing and request/reply correlation.
//!
//! - `ActorId`: unique per actor instance, used in logs and failure reports
//! - `CorrelationId`: links an `ask` request to its eventual reply
//! - `Correlatable`: capability of messages that can carry a correlation id

use uuid::Uuid;

/// Unique identifier for an actor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(pub u64);

impl ActorId {
    /// Create a new random actor ID
    pub fn new() -> Self {
        Self(rand::random())
    }

    /// Create actor ID from a specific value
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Correlation ID for request/reply pattern.
///
/// Generated as a random (v4) UUID per request and carried as a `u128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub u128);

impl CorrelationId {
    /// Generate a new random correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_u128())
    }

    /// Create correlation ID from a specific value
    pub fn from_u128(id: u128) -> Self {
        Self(id)
    }

    /// Get the underlying u128 value
    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// View as a UUID
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_u128(self.0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_uuid())
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.as_u128())
    }
}

/// Messages that expose a settable correlation id.
///
/// `ask` stamps a fresh id onto the outgoing message; the handler reads it
/// back to address its reply.
pub trait Correlatable {
    /// Correlation id of this message, if it is part of a request
    fn correlation_id(&self) -> Option<CorrelationId>;

    /// Stamp the correlation id for an outgoing request
    fn set_correlation_id(&mut self, id: CorrelationId);
}
