//! Actor construction, lifecycle and run loop

use super::context::{ActorContext, ActorRef, ActorShared};
use super::handle::{FnHandler, LifecycleHook, MessageHandler};
use super::persist::Persistent;
use super::status::ActorStatus;
use super::supervision::{ActorFailure, Directive, ErrorHandler, FailureSink, ResumeOnError};
use crate::channel::{new_channel, BlockingChannel, EventChannel, EventReceiver, EventSender};
use crate::error::{ActorError, HandlerError, Result};
use crate::handler::HandlerRegistry;
use hyphae_config::{ChannelConfig, StageConfig};
use hyphae_protocol::{ActorId, Correlatable, CorrelationId, MessageTag, Tagged};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Builder for [`Actor`]
///
/// # Example
///
/// ```rust,ignore
/// let executor = Actor::builder("binance-orders")
///     .mailbox(supervisor.channel(Stage::Execution))
///     .on(OrderTag::Submit, |cmd, ctx| gateway.submit(cmd))
///     .on(OrderTag::Cancel, |cmd, ctx| gateway.cancel(cmd))
///     .on_error(|err: &HandlerError| Directive::Escalate)
///     .build();
/// ```
pub struct ActorBuilder<M: Tagged> {
    name: String,
    mailbox: Option<Arc<dyn EventChannel<M>>>,
    handler: Option<Box<dyn MessageHandler<M>>>,
    registry: HandlerRegistry<M, ActorContext<M>>,
    error_handler: Box<dyn ErrorHandler>,
    hooks: Vec<Box<dyn LifecycleHook<M>>>,
    stop_grace: Duration,
    poll_interval: Duration,
}

impl<M: Tagged> ActorBuilder<M> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mailbox: None,
            handler: None,
            registry: HandlerRegistry::new(),
            error_handler: Box::new(ResumeOnError),
            hooks: Vec::new(),
            stop_grace: DEFAULT_STOP_GRACE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Mailbox, grace period and poll interval from a stage's configuration
    pub fn from_stage(name: impl Into<String>, stage: &StageConfig) -> Self {
        Self::new(name)
            .channel(&stage.channel)
            .stop_grace(stage.stop_grace())
            .poll_interval(stage.poll_interval())
    }

    /// Use an existing channel as the mailbox
    pub fn mailbox(mut self, mailbox: Arc<dyn EventChannel<M>>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Build the mailbox from a channel configuration
    pub fn channel(self, config: &ChannelConfig) -> Self {
        self.mailbox(new_channel(config))
    }

    /// Handle every message with `handler`
    pub fn handler(mut self, handler: impl MessageHandler<M>) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Handle every message with a closure
    pub fn handle_with<F>(self, f: F) -> Self
    where
        F: FnMut(M, &mut ActorContext<M>) -> anyhow::Result<()> + Send + 'static,
    {
        self.handler(FnHandler(f))
    }

    /// Register the handler for one message tag
    pub fn on<F>(mut self, tag: M::Tag, f: F) -> Self
    where
        F: FnMut(M, &mut ActorContext<M>) -> anyhow::Result<()> + Send + 'static,
    {
        self.registry.register(tag, f);
        self
    }

    /// Decide what happens after a failed message (default: resume)
    pub fn on_error(mut self, error_handler: impl ErrorHandler) -> Self {
        self.error_handler = Box::new(error_handler);
        self
    }

    pub fn hook(mut self, hook: impl LifecycleHook<M>) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Load `state` when the actor starts and save it when it stops
    pub fn persist<S>(self, state: Persistent<S>) -> Self
    where
        S: Clone + Send + Sync + 'static,
    {
        self.hook(state)
    }

    /// How long `stop` waits for the run loop before detaching it
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Upper bound on how long an idle run loop sleeps before rechecking
    /// its status
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn build(self) -> Actor<M> {
        let handler: Box<dyn MessageHandler<M>> = match self.handler {
            Some(handler) => {
                if !self.registry.is_empty() {
                    warn!(
                        actor = %self.name,
                        handlers = self.registry.len(),
                        "Explicit handler set; tag handlers are ignored"
                    );
                }
                handler
            }
            None => Box::new(self.registry),
        };

        let mailbox: Arc<dyn EventChannel<M>> = match self.mailbox {
            Some(mailbox) => mailbox,
            None => Arc::new(BlockingChannel::new()),
        };
        let shared = Arc::new(ActorShared::new(self.name, mailbox));

        Actor {
            handle: ActorRef::new(Arc::clone(&shared)),
            shared,
            parts: Mutex::new(Some(RunParts {
                handler,
                error_handler: self.error_handler,
                hooks: self.hooks,
            })),
            thread: Mutex::new(None),
            stop_grace: self.stop_grace,
            poll_interval: self.poll_interval,
        }
    }
}

/// Everything the run loop owns; moved onto its thread by `start`
struct RunParts<M: Tagged> {
    handler: Box<dyn MessageHandler<M>>,
    error_handler: Box<dyn ErrorHandler>,
    hooks: Vec<Box<dyn LifecycleHook<M>>>,
}

struct RunThread {
    handle: JoinHandle<()>,
    done: crossbeam_channel::Receiver<()>,
}

/// An actor: a private mailbox drained by a dedicated run loop thread
///
/// Built with [`Actor::builder`]. `tell`/`ask` are also available on the
/// cloneable [`ActorRef`] from [`Actor::actor_ref`].
pub struct Actor<M: Tagged> {
    shared: Arc<ActorShared<M>>,
    handle: ActorRef<M>,
    parts: Mutex<Option<RunParts<M>>>,
    thread: Mutex<Option<RunThread>>,
    stop_grace: Duration,
    poll_interval: Duration,
}

impl<M: Tagged> Actor<M> {
    pub fn builder(name: impl Into<String>) -> ActorBuilder<M> {
        ActorBuilder::new(name)
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

    pub fn actor_ref(&self) -> ActorRef<M> {
        self.handle.clone()
    }

    pub fn tell(&self, msg: M) -> Result<()> {
        self.handle.tell(msg)
    }

    pub fn ask<R: Send + 'static>(&self, msg: M, timeout: Duration) -> Result<R>
    where
        M: Correlatable,
    {
        self.handle.ask(msg, timeout)
    }

    pub async fn ask_async<R: Send + 'static>(&self, msg: M, timeout: Duration) -> Result<R>
    where
        M: Correlatable,
    {
        self.handle.ask_async(msg, timeout).await
    }

    pub fn reply<R: Send + 'static>(&self, id: CorrelationId, value: R) -> bool {
        self.handle.reply(id, value)
    }

    /// Receive a notification if this actor fails while running
    pub fn attach_failure_sink(&self, sink: FailureSink) {
        *self.shared.failure_sink.lock() = Some(sink);
    }

    /// Spawn the run loop. Calling it again while running is a no-op;
    /// a stopped or failed actor cannot be restarted.
    pub fn start(&self) -> Result<()> {
        match self
            .shared
            .status
            .transition(ActorStatus::Idle, ActorStatus::Running)
        {
            Ok(()) => {}
            Err(ActorStatus::Running) => {
                debug!(actor = %self.shared.name, "Actor already running");
                return Ok(());
            }
            Err(_) => return Err(ActorError::AlreadyStopped),
        }

        let Some(parts) = self.parts.lock().take() else {
            return Err(ActorError::AlreadyStopped);
        };

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let run_loop = RunLoop {
            shared: Arc::clone(&self.shared),
            parts,
            poll_interval: self.poll_interval,
            _done: done_tx,
        };

        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run_loop.run());

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(RunThread {
                    handle,
                    done: done_rx,
                });
                info!(actor = %self.shared.name, actor_id = %self.shared.id, "Actor started");
                Ok(())
            }
            Err(err) => {
                self.shared.status.fail();
                self.shared.mailbox.close();
                error!(actor = %self.shared.name, error = %err, "Failed to spawn run loop");
                Err(ActorError::Spawn(err))
            }
        }
    }

    /// Stop the actor and wait (up to the grace period) for its run loop.
    ///
    /// Pending `ask` callers get `NotRunning`; messages still in the
    /// mailbox are discarded. Safe to call repeatedly and from the actor's
    /// own handler.
    pub fn stop(&self) {
        let previous = self.shared.status.stop();
        self.shared.mailbox.close();
        let abandoned = self.shared.pending.clear();
        if abandoned > 0 {
            debug!(actor = %self.shared.name, abandoned, "Dropped pending requests");
        }

        let Some(run_thread) = self.thread.lock().take() else {
            return;
        };

        if run_thread.handle.thread().id() == thread::current().id() {
            // Stopping from inside a handler; the loop exits on its next check
            return;
        }

        match run_thread.done.recv_timeout(self.stop_grace) {
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                warn!(
                    actor = %self.shared.name,
                    grace_ms = self.stop_grace.as_millis() as u64,
                    "Run loop did not exit within grace period; detaching"
                );
            }
            _ => {
                if run_thread.handle.join().is_err() {
                    warn!(actor = %self.shared.name, "Run loop thread panicked");
                }
                if previous == ActorStatus::Running {
                    info!(actor = %self.shared.name, "Actor stopped");
                }
            }
        }
    }
}

impl<M: Tagged> Drop for Actor<M> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<M: Tagged> std::fmt::Debug for Actor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .finish()
    }
}

enum Exit {
    /// Stop requested (externally, by the handler, or by `Directive::Stop`)
    Stopped,
    /// Mailbox closed and drained
    EndOfStream,
    Failed(String),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Unknown panic".to_string()
    }
}

struct RunLoop<M: Tagged> {
    shared: Arc<ActorShared<M>>,
    parts: RunParts<M>,
    poll_interval: Duration,
    /// Dropped when the loop exits (even by unwinding), waking `stop`
    _done: crossbeam_channel::Sender<()>,
}

impl<M: Tagged> RunLoop<M> {
    fn run(mut self) {
        let span = info_span!("actor", actor = %self.shared.name, actor_id = %self.shared.id);
        let _enter = span.enter();

        let mut ctx = ActorContext::new(Arc::clone(&self.shared));

        let exit = match self.run_started_hooks(&mut ctx) {
            Some(exit) => exit,
            None => self.process(&mut ctx),
        };
        let exit = match self.run_stopped_hooks(&mut ctx) {
            Some(Exit::Failed(reason)) if !matches!(exit, Exit::Failed(_)) => Exit::Failed(reason),
            _ => exit,
        };

        self.finish(exit);
    }

    fn run_started_hooks(&mut self, ctx: &mut ActorContext<M>) -> Option<Exit> {
        let parts = &mut self.parts;
        let started = panic::catch_unwind(AssertUnwindSafe(|| {
            for hook in parts.hooks.iter_mut() {
                hook.on_start(ctx);
            }
            parts.handler.started(ctx);
        }));
        if let Err(payload) = started {
            return Some(Exit::Failed(format!(
                "started hook panicked: {}",
                panic_message(payload)
            )));
        }
        self.drain_reported(ctx)
    }

    fn run_stopped_hooks(&mut self, ctx: &mut ActorContext<M>) -> Option<Exit> {
        let parts = &mut self.parts;
        let stopped = panic::catch_unwind(AssertUnwindSafe(|| {
            parts.handler.stopped(ctx);
            for hook in parts.hooks.iter_mut() {
                hook.on_stop(ctx);
            }
        }));
        if let Err(payload) = stopped {
            return Some(Exit::Failed(format!(
                "stopped hook panicked: {}",
                panic_message(payload)
            )));
        }
        self.drain_reported(ctx)
    }

    fn process(&mut self, ctx: &mut ActorContext<M>) -> Exit {
        loop {
            if ctx.stop_requested() || self.shared.status.load() != ActorStatus::Running {
                return Exit::Stopped;
            }

            let event = match self.shared.mailbox.receive_timeout(self.poll_interval) {
                Some(event) => event,
                None => {
                    if self.shared.mailbox.is_closed() && self.shared.mailbox.is_empty() {
                        return Exit::EndOfStream;
                    }
                    continue;
                }
            };

            // A stop may land while the loop waits on the mailbox
            if ctx.stop_requested() || self.shared.status.load() != ActorStatus::Running {
                debug!(tag = event.tag().as_str(), "Stopped before dispatch; message discarded");
                return Exit::Stopped;
            }

            let tag = event.tag();
            let started = Instant::now();
            let handler = &mut self.parts.handler;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.handle(event.into_payload(), ctx)
            }))
            .unwrap_or_else(|payload| {
                self.shared.metrics.record_panic();
                Err(HandlerError::Panicked(panic_message(payload)))
            });

            match result {
                Ok(()) => self
                    .shared
                    .metrics
                    .record_processed(started.elapsed().as_micros() as u64),
                Err(HandlerError::HandlerNotFound { tag }) => {
                    self.shared.metrics.record_unhandled();
                    warn!(tag, "No handler registered; message dropped");
                }
                Err(err) => {
                    self.shared.metrics.record_failure();
                    error!(tag = tag.as_str(), error = %err, "Handler failed");
                    if let Some(exit) = self.apply_directive(err) {
                        return exit;
                    }
                }
            }

            if let Some(exit) = self.drain_reported(ctx) {
                return exit;
            }
        }
    }

    /// Ask the error handler what to do; a panicking error handler fails
    /// the actor.
    fn consult(&mut self, err: &HandlerError) -> std::result::Result<Directive, String> {
        let error_handler = &mut self.parts.error_handler;
        panic::catch_unwind(AssertUnwindSafe(|| error_handler.on_error(err)))
            .map_err(|payload| format!("error handler panicked: {}", panic_message(payload)))
    }

    fn apply_directive(&mut self, err: HandlerError) -> Option<Exit> {
        let directive = match self.consult(&err) {
            Ok(directive) => directive,
            Err(reason) => return Some(Exit::Failed(reason)),
        };
        if err.is_recoverable() {
            return None;
        }
        match directive {
            Directive::Resume => None,
            Directive::Stop => {
                info!(error = %err, "Error handler requested stop");
                Some(Exit::Stopped)
            }
            Directive::Escalate => Some(Exit::Failed(err.to_string())),
        }
    }

    /// Errors reported through the context reach the error handler, but
    /// their directive is not applied.
    fn drain_reported(&mut self, ctx: &mut ActorContext<M>) -> Option<Exit> {
        for err in ctx.take_reported() {
            warn!(error = %err, "Reported error");
            if let Err(reason) = self.consult(&err) {
                return Some(Exit::Failed(reason));
            }
        }
        None
    }

    fn finish(self, exit: Exit) {
        let shared = &self.shared;
        match exit {
            Exit::Stopped | Exit::EndOfStream => {
                shared.status.stop();
                debug!("Run loop exited");
            }
            Exit::Failed(reason) => {
                if shared.status.fail() {
                    error!(reason = %reason, "Actor failed");
                    let sink = shared.failure_sink.lock().clone();
                    if let Some(sink) = sink {
                        sink(ActorFailure {
                            actor: shared.name.clone(),
                            actor_id: shared.id,
                            reason,
                        });
                    }
                } else {
                    // An explicit stop already won; the failure is moot
                    shared.status.stop();
                    warn!(reason = %reason, "Actor failed while stopping");
                }
            }
        }

        shared.mailbox.close();
        let mut discarded = 0usize;
        while shared.mailbox.receive().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "Discarded undelivered messages");
        }
        shared.pending.clear();

        shared.metrics.log_summary(&shared.name);
    }
}
