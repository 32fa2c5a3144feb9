//! Error directives and failure reporting for actor run loops

use crate::error::HandlerError;
use hyphae_protocol::ActorId;
use std::fmt;
use std::sync::Arc;

/// What the run loop does after its error handler has seen a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Directive {
    /// Drop the message and keep processing
    #[default]
    Resume,

    /// Exit the run loop cleanly; the actor ends `Stopped`
    Stop,

    /// Exit the run loop and report the failure to the supervisor; the
    /// actor ends `Failed`
    Escalate,
}

/// Decides how an actor reacts to a failed message
///
/// Closures `FnMut(&HandlerError) -> Directive` implement this trait.
pub trait ErrorHandler: Send + 'static {
    fn on_error(&mut self, error: &HandlerError) -> Directive;
}

impl<F> ErrorHandler for F
where
    F: FnMut(&HandlerError) -> Directive + Send + 'static,
{
    fn on_error(&mut self, error: &HandlerError) -> Directive {
        self(error)
    }
}

/// Default error handler: the run loop has already logged the failure, so
/// keep going.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeOnError;

impl ErrorHandler for ResumeOnError {
    fn on_error(&mut self, _error: &HandlerError) -> Directive {
        Directive::Resume
    }
}

/// Report of an actor that left `Running` through failure
#[derive(Debug, Clone)]
pub struct ActorFailure {
    pub actor: String,
    pub actor_id: ActorId,
    pub reason: String,
}

impl fmt::Display for ActorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor {} ({}) failed: {}", self.actor, self.actor_id, self.reason)
    }
}

/// Callback invoked (on the failing actor's thread) when it fails
pub type FailureSink = Arc<dyn Fn(ActorFailure) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(Directive::default(), Directive::Resume);
        let err = HandlerError::Panicked("boom".to_string());
        assert_eq!(ResumeOnError.on_error(&err), Directive::Resume);
    }

    #[test]
    fn test_closure_error_handler() {
        let mut handler = |err: &HandlerError| {
            match err {
                HandlerError::Panicked(_) => Directive::Escalate,
                _ => Directive::Resume,
            }
        };

        let panicked = HandlerError::Panicked("boom".to_string());
        let failed = HandlerError::Failed(anyhow::anyhow!("stale quote"));
        assert_eq!(ErrorHandler::on_error(&mut handler, &panicked), Directive::Escalate);
        assert_eq!(ErrorHandler::on_error(&mut handler, &failed), Directive::Resume);
    }

    #[test]
    fn test_failure_display() {
        let failure = ActorFailure {
            actor: "okx-orders".to_string(),
            actor_id: ActorId::from_u64(0xab),
            reason: "gateway rejected".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "actor okx-orders (00000000000000ab) failed: gateway rejected"
        );
    }
}
