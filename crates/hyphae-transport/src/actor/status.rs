//! Actor lifecycle state machine

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle status of an actor
///
/// ```text
/// Idle ──start──▶ Running ──stop / Directive::Stop──▶ Stopped
///                    │
///                    └──Directive::Escalate / hook panic──▶ Failed
/// ```
///
/// `Stopped` and `Failed` are terminal: a stopped actor is rebuilt, never
/// restarted.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorStatus {
    Idle = 0,
    Running = 1,
    Stopped = 2,
    Failed = 3,
}

impl ActorStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ActorStatus::Idle,
            1 => ActorStatus::Running,
            2 => ActorStatus::Stopped,
            _ => ActorStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActorStatus::Stopped | ActorStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorStatus::Idle => "idle",
            ActorStatus::Running => "running",
            ActorStatus::Stopped => "stopped",
            ActorStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding an [`ActorStatus`], shared with external callers
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ActorStatus::Idle as u8))
    }

    pub(crate) fn load(&self) -> ActorStatus {
        ActorStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to`; on failure returns the status actually observed
    pub(crate) fn transition(&self, from: ActorStatus, to: ActorStatus) -> Result<(), ActorStatus> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ActorStatus::from_u8)
    }

    /// Mark stopped unless already terminal. Returns the previous status.
    pub(crate) fn stop(&self) -> ActorStatus {
        let mut current = self.load();
        loop {
            if current.is_terminal() {
                return current;
            }
            match self.transition(current, ActorStatus::Stopped) {
                Ok(()) => return current,
                Err(actual) => current = actual,
            }
        }
    }

    /// `Running -> Failed`. Returns false if the actor was not running
    /// (e.g. an explicit stop got there first).
    pub(crate) fn fail(&self) -> bool {
        self.transition(ActorStatus::Running, ActorStatus::Failed)
            .is_ok()
    }
}
