//! Actor context and reference types
//!
//! `ActorRef` is the cloneable handle other threads use to talk to an actor;
//! `ActorContext` is what a handler sees while it runs.

use super::metrics::ActorMetrics;
use super::pending::{PendingRequests, ReplySlot};
use super::status::{ActorStatus, StatusCell};
use super::supervision::FailureSink;
use crate::channel::{EventChannel, EventSender};
use crate::error::{ActorError, HandlerError, Result, SendError};
use hyphae_protocol::{ActorId, Correlatable, CorrelationId, Event, Tagged};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// State shared between an actor, its run loop and every `ActorRef`
pub(crate) struct ActorShared<M: Tagged> {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) mailbox: Arc<dyn EventChannel<M>>,
    pub(crate) status: StatusCell,
    pub(crate) pending: PendingRequests,
    pub(crate) metrics: ActorMetrics,
    pub(crate) failure_sink: Mutex<Option<FailureSink>>,
}

impl<M: Tagged> ActorShared<M> {
    pub(crate) fn new(name: String, mailbox: Arc<dyn EventChannel<M>>) -> Self {
        Self {
            id: ActorId::new(),
            name,
            mailbox,
            status: StatusCell::new(),
            pending: PendingRequests::new(),
            metrics: ActorMetrics::new(),
            failure_sink: Mutex::new(None),
        }
    }
}

fn downcast_reply<R: 'static>(reply: Box<dyn Any + Send>) -> Result<R> {
    reply
        .downcast::<R>()
        .map(|value| *value)
        .map_err(|_| ActorError::TypeMismatch {
            expected: std::any::type_name::<R>(),
        })
}

/// Cloneable handle for sending messages to an actor
pub struct ActorRef<M: Tagged> {
    shared: Arc<ActorShared<M>>,
}

impl<M: Tagged> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: Tagged> ActorRef<M> {
    pub(crate) fn new(shared: Arc<ActorShared<M>>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> ActorId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn status(&self) -> ActorStatus {
        self.shared.status.load()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ActorStatus::Running
    }

    /// Messages waiting in the mailbox
    pub fn mailbox_len(&self) -> usize {
        self.shared.mailbox.len()
    }

    /// Requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn metrics(&self) -> &ActorMetrics {
        &self.shared.metrics
    }

    /// Enqueue a message without waiting for it to be handled.
    ///
    /// Never waits for mailbox space, whatever the full policy: a full
    /// `Block` ring returns `MailboxFull` just like `DiscardNewest`.
    pub fn tell(&self, msg: M) -> Result<()> {
        if !self.is_running() {
            return Err(ActorError::NotRunning);
        }
        match self.shared.mailbox.try_send_now(Event::new(msg)) {
            Ok(()) => Ok(()),
            Err(SendError::Closed(_)) => Err(ActorError::NotRunning),
            Err(SendError::Full(_)) => Err(ActorError::MailboxFull),
        }
    }

    /// Stamp `msg` with a fresh correlation id, register the reply slot and
    /// enqueue. The slot is removed again if the message never got in.
    fn submit(&self, mut msg: M, slot: ReplySlot) -> Result<CorrelationId>
    where
        M: Correlatable,
    {
        if !self.is_running() {
            return Err(ActorError::NotRunning);
        }
        let id = CorrelationId::new();
        msg.set_correlation_id(id);
        self.shared.pending.register(id, slot);

        if let Err(err) = self.tell(msg) {
            self.shared.pending.cancel(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Send a request and block until its reply arrives or `timeout` passes.
    ///
    /// Errors:
    /// - `Timeout`: no reply in time; the pending entry is removed and a late
    ///   reply is silently dropped
    /// - `NotRunning`: the actor was not running or stopped while waiting
    /// - `TypeMismatch`: the handler replied with something other than `R`
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let position: Position = strategy.ask(Query::position("BTC-USDT"), Duration::from_millis(50))?;
    /// ```
    pub fn ask<R: Send + 'static>(&self, msg: M, timeout: Duration) -> Result<R>
    where
        M: Correlatable,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let id = self.submit(msg, ReplySlot::Blocking(tx))?;

        match rx.recv_timeout(timeout) {
            Ok(reply) => downcast_reply(reply),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                self.shared.pending.cancel(id);
                Err(ActorError::Timeout(timeout))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(ActorError::NotRunning),
        }
    }

    /// [`ask`](Self::ask) for callers running on a tokio runtime
    pub async fn ask_async<R: Send + 'static>(&self, msg: M, timeout: Duration) -> Result<R>
    where
        M: Correlatable,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.submit(msg, ReplySlot::Async(tx))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => downcast_reply(reply),
            Ok(Err(_)) => Err(ActorError::NotRunning),
            Err(_) => {
                self.shared.pending.cancel(id);
                Err(ActorError::Timeout(timeout))
            }
        }
    }

    /// Complete a pending request. Returns false if nobody is waiting for
    /// `id` any more (already replied, timed out, or stopped).
    pub fn reply<R: Send + 'static>(&self, id: CorrelationId, value: R) -> bool {
        self.shared.pending.fulfil(id, Box::new(value))
    }
}

impl<M: Tagged> std::fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Context provided to handlers during message handling
///
/// Allows handlers to:
/// - Reply to `ask` requests
/// - Stop their own actor
/// - Report errors (e.g. persistence failures) without failing the message
pub struct ActorContext<M: Tagged> {
    shared: Arc<ActorShared<M>>,
    stop_requested: bool,
    reported: Vec<HandlerError>,
}

impl<M: Tagged> ActorContext<M> {
    pub(crate) fn new(shared: Arc<ActorShared<M>>) -> Self {
        Self {
            shared,
            stop_requested: false,
            reported: Vec::new(),
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Complete the request identified by `id`; a no-op (returning false)
    /// when the asker has already gone.
    pub fn reply<R: Send + 'static>(&self, id: CorrelationId, value: R) -> bool {
        self.shared.pending.fulfil(id, Box::new(value))
    }

    /// Reply to the request `msg` came from. Returns false if `msg` carries
    /// no correlation id.
    pub fn reply_to<R: Send + 'static>(&self, msg: &M, value: R) -> bool
    where
        M: Correlatable,
    {
        match msg.correlation_id() {
            Some(id) => self.reply(id, value),
            None => false,
        }
    }

    /// Ask the run loop to exit after the current message
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Route an error to the actor's error handler once the current message
    /// is done. The handler's directive is not applied.
    pub fn report_error(&mut self, error: impl Into<HandlerError>) {
        self.reported.push(error.into());
    }

    pub(crate) fn take_reported(&mut self) -> Vec<HandlerError> {
        std::mem::take(&mut self.reported)
    }

    /// Handle to this actor, e.g. to send itself a message
    pub fn self_ref(&self) -> ActorRef<M> {
        ActorRef::new(Arc::clone(&self.shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BlockingChannel, EventReceiver};
    use hyphae_protocol::message_tag;

    message_tag! {
        enum QueryTag {
            Position => "query.position",
        }
    }

    struct Position {
        correlation: Option<CorrelationId>,
    }

    hyphae_protocol::impl_tagged!(Position, QueryTag, QueryTag::Position);

    impl Correlatable for Position {
        fn correlation_id(&self) -> Option<CorrelationId> {
            self.correlation
        }

        fn set_correlation_id(&mut self, id: CorrelationId) {
            self.correlation = Some(id);
        }
    }

    fn shared(running: bool) -> Arc<ActorShared<Position>> {
        let shared = Arc::new(ActorShared::new(
            "positions".to_string(),
            Arc::new(BlockingChannel::new()),
        ));
        if running {
            shared
                .status
                .transition(ActorStatus::Idle, ActorStatus::Running)
                .unwrap();
        }
        shared
    }

    #[test]
    fn test_tell_requires_running() {
        let actor = ActorRef::new(shared(false));
        let err = actor.tell(Position { correlation: None }).unwrap_err();
        assert!(matches!(err, ActorError::NotRunning));
    }

    #[test]
    fn test_tell_enqueues() {
        let actor = ActorRef::new(shared(true));
        actor.tell(Position { correlation: None }).unwrap();
        assert_eq!(actor.mailbox_len(), 1);
    }

    #[test]
    fn test_tell_to_closed_mailbox() {
        let shared = shared(true);
        shared.mailbox.close();
        let err = ActorRef::new(shared)
            .tell(Position { correlation: None })
            .unwrap_err();
        assert!(matches!(err, ActorError::NotRunning));
    }

    #[test]
    fn test_ask_timeout_removes_pending() {
        let actor = ActorRef::new(shared(true));
        let err = actor
            .ask::<u64>(Position { correlation: None }, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ActorError::Timeout(_)));
        assert_eq!(actor.pending_requests(), 0);

        // Late reply finds nobody waiting
        let msg = actor.shared.mailbox.receive().unwrap().into_payload();
        let ctx = ActorContext::new(Arc::clone(&actor.shared));
        assert!(!ctx.reply_to(&msg, 7u64));
    }

    #[test]
    fn test_context_reply_and_stop() {
        let shared = shared(true);
        let mut ctx = ActorContext::new(Arc::clone(&shared));
        assert_eq!(ctx.name(), "positions");
        assert_eq!(ctx.actor_id(), shared.id);
        assert!(!ctx.reply(CorrelationId::new(), ()));
        assert!(!ctx.reply_to(&Position { correlation: None }, ()));

        ctx.stop();
        assert!(ctx.stop_requested());

        ctx.report_error(anyhow::anyhow!("disk full"));
        assert_eq!(ctx.take_reported().len(), 1);
        assert!(ctx.take_reported().is_empty());
        assert!(ctx.self_ref().is_running());
    }

    #[test]
    fn test_type_mismatch() {
        let err = downcast_reply::<u64>(Box::new("not a number")).unwrap_err();
        assert!(matches!(err, ActorError::TypeMismatch { expected: "u64" }));
    }
}
