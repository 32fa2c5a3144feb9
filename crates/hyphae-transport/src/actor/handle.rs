//! Message handler and lifecycle hook traits
//!
//! An actor owns exactly one [`MessageHandler`]. It can be a hand-written
//! type, a closure (through [`FnHandler`]) or a [`HandlerRegistry`] routing
//! by tag.

use super::context::ActorContext;
use crate::error::HandlerError;
use crate::handler::HandlerRegistry;
use hyphae_protocol::Tagged;

/// Core message handling trait
///
/// # Example
///
/// ```rust,ignore
/// struct Exposure {
///     net: i64,
/// }
///
/// impl MessageHandler<Fill> for Exposure {
///     fn handle(&mut self, fill: Fill, _ctx: &mut ActorContext<Fill>) -> Result<(), HandlerError> {
///         self.net += fill.signed_qty();
///         Ok(())
///     }
/// }
/// ```
pub trait MessageHandler<M: Tagged>: Send + 'static {
    /// Handle one message. An `Err` (or a panic) is routed to the actor's
    /// error handler; it never kills the run loop by itself.
    fn handle(&mut self, msg: M, ctx: &mut ActorContext<M>) -> Result<(), HandlerError>;

    /// Called on the run loop thread before the first message
    fn started(&mut self, _ctx: &mut ActorContext<M>) {}

    /// Called on the run loop thread after the last message
    fn stopped(&mut self, _ctx: &mut ActorContext<M>) {}
}

/// Adapts a closure into a [`MessageHandler`]
pub struct FnHandler<F>(pub F);

impl<M, F> MessageHandler<M> for FnHandler<F>
where
    M: Tagged,
    F: FnMut(M, &mut ActorContext<M>) -> anyhow::Result<()> + Send + 'static,
{
    fn handle(&mut self, msg: M, ctx: &mut ActorContext<M>) -> Result<(), HandlerError> {
        (self.0)(msg, ctx).map_err(HandlerError::Failed)
    }
}

impl<M: Tagged> MessageHandler<M> for HandlerRegistry<M, ActorContext<M>> {
    fn handle(&mut self, msg: M, ctx: &mut ActorContext<M>) -> Result<(), HandlerError> {
        self.dispatch(msg, ctx)
    }
}

/// Extra work run around an actor's message loop (state restore/save)
pub trait LifecycleHook<M: Tagged>: Send + 'static {
    fn on_start(&mut self, _ctx: &mut ActorContext<M>) {}

    fn on_stop(&mut self, _ctx: &mut ActorContext<M>) {}
}
