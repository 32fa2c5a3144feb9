//! Ordered lifecycle management for a graph of actors
//!
//! Actors are grouped by role. Start order follows the data flow
//! (sources, then strategies, then executors) and stop order reverses it, so
//! no actor is ever fed by a stage that has already shut down.
//!
//! A monitor thread receives failure reports from every supervised actor.
//! By default one failed actor stops the whole graph.

use crate::actor::{Actor, ActorBuilder, ActorFailure, ActorStatus, FailureSink};
use crate::channel::{new_channel, EventChannel};
use crate::error::{ActorError, SupervisorError};
use hyphae_config::{RuntimeConfig, Stage};
use hyphae_protocol::Tagged;
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Anything the supervisor can start and stop
pub trait Supervised: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self) -> Result<(), ActorError>;

    fn stop(&self);

    fn status(&self) -> ActorStatus;

    /// Where to report a failure while running
    fn attach_failure_sink(&self, sink: FailureSink);
}

impl<M: Tagged> Supervised for Actor<M> {
    fn name(&self) -> &str {
        Actor::name(self)
    }

    fn start(&self) -> Result<(), ActorError> {
        Actor::start(self)
    }

    fn stop(&self) {
        Actor::stop(self)
    }

    fn status(&self) -> ActorStatus {
        Actor::status(self)
    }

    fn attach_failure_sink(&self, sink: FailureSink) {
        Actor::attach_failure_sink(self, sink)
    }
}

impl<T: Supervised + ?Sized> Supervised for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&self) -> Result<(), ActorError> {
        (**self).start()
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn status(&self) -> ActorStatus {
        (**self).status()
    }

    fn attach_failure_sink(&self, sink: FailureSink) {
        (**self).attach_failure_sink(sink)
    }
}

/// What the supervisor does when an actor fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureAction {
    /// Stop every supervised actor (fail-fast)
    #[default]
    StopAll,

    /// Log and keep the remaining actors running
    Ignore,
}

type FailureHandler = Box<dyn FnMut(&ActorFailure) -> FailureAction + Send>;

enum SupervisorEvent {
    Failed(ActorFailure),
    Shutdown,
}

#[derive(Default)]
struct Groups {
    sources: Vec<Arc<dyn Supervised>>,
    strategies: Vec<Arc<dyn Supervised>>,
    executors: Vec<Arc<dyn Supervised>>,
}

impl Groups {
    fn start_order(&self) -> Vec<Arc<dyn Supervised>> {
        self.sources
            .iter()
            .chain(&self.strategies)
            .chain(&self.executors)
            .cloned()
            .collect()
    }

    fn stop_order(&self) -> Vec<Arc<dyn Supervised>> {
        let mut order = self.start_order();
        order.reverse();
        order
    }
}

/// Stop every actor, executors first. A misbehaving `stop` never prevents
/// the remaining actors from being stopped.
fn stop_in_order(groups: &RwLock<Groups>) {
    let order = groups.read().stop_order();
    for actor in order {
        let stopped = panic::catch_unwind(AssertUnwindSafe(|| actor.stop()));
        match stopped {
            Ok(()) => debug!(actor = actor.name(), status = %actor.status(), "Stopped"),
            Err(_) => error!(actor = actor.name(), "Stop panicked; continuing shutdown"),
        }
    }
}

/// Starts, stops and watches a graph of actors
///
/// # Example
///
/// ```rust,ignore
/// let mut supervisor = Supervisor::new(RuntimeConfig::load("hyphae.toml")?);
/// supervisor
///     .add_source(feed)
///     .add_strategy(market_maker)
///     .add_executor(order_gateway);
/// supervisor.start_all()?;
/// // ...
/// supervisor.stop_all();
/// ```
pub struct Supervisor {
    config: RuntimeConfig,
    groups: Arc<RwLock<Groups>>,
    failure_handler: Arc<Mutex<FailureHandler>>,
    events: crossbeam_channel::Sender<SupervisorEvent>,
    events_rx: crossbeam_channel::Receiver<SupervisorEvent>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(config: RuntimeConfig) -> Self {
        let (events, events_rx) = crossbeam_channel::unbounded();
        let stop_all: FailureHandler = Box::new(|_: &ActorFailure| FailureAction::StopAll);
        Self {
            config,
            groups: Arc::new(RwLock::new(Groups::default())),
            failure_handler: Arc::new(Mutex::new(stop_all)),
            events,
            events_rx,
            monitor: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build a channel configured for `stage`
    pub fn channel<T: Tagged>(&self, stage: Stage) -> Arc<dyn EventChannel<T>> {
        new_channel(&self.config.stage(stage).channel)
    }

    /// Actor builder preconfigured for `stage` (mailbox, grace, poll interval)
    pub fn actor_builder<M: Tagged>(&self, name: impl Into<String>, stage: Stage) -> ActorBuilder<M> {
        ActorBuilder::from_stage(name, self.config.stage(stage))
    }

    /// Market-data producers, started first and stopped last
    pub fn add_source(&mut self, actor: impl Supervised + 'static) -> &mut Self {
        self.groups.write().sources.push(Arc::new(actor));
        self
    }

    pub fn add_strategy(&mut self, actor: impl Supervised + 'static) -> &mut Self {
        self.groups.write().strategies.push(Arc::new(actor));
        self
    }

    /// Trade gateways, started last and stopped first
    pub fn add_executor(&mut self, actor: impl Supervised + 'static) -> &mut Self {
        self.groups.write().executors.push(Arc::new(actor));
        self
    }

    /// Replace the failure policy (default: [`FailureAction::StopAll`]).
    /// Runs on the monitor thread.
    pub fn on_failure<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&ActorFailure) -> FailureAction + Send + 'static,
    {
        *self.failure_handler.lock() = Box::new(handler);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Name and status of every actor, in start order
    pub fn status(&self) -> Vec<(String, ActorStatus)> {
        self.groups
            .read()
            .start_order()
            .iter()
            .map(|actor| (actor.name().to_string(), actor.status()))
            .collect()
    }

    /// Start sources, then strategies, then executors.
    ///
    /// If any actor fails to start, everything is stopped again and the
    /// error returned. Calling it while running is a no-op.
    pub fn start_all(&self) -> Result<(), SupervisorError> {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("Supervisor already running");
            return Ok(());
        }

        if let Err(err) = self.spawn_monitor() {
            self.running.store(false, Ordering::Release);
            return Err(err);
        }

        let sink = self.failure_sink();
        let order = self.groups.read().start_order();
        for actor in &order {
            actor.attach_failure_sink(Arc::clone(&sink));
            if let Err(source) = actor.start() {
                error!(actor = actor.name(), error = %source, "Actor failed to start; unwinding");
                self.stop_all();
                return Err(SupervisorError::StartFailed {
                    actor: actor.name().to_string(),
                    source,
                });
            }
            debug!(actor = actor.name(), "Started");
        }

        info!(actors = order.len(), "All actors started");
        Ok(())
    }

    /// Stop executors, then strategies, then sources. Idempotent.
    pub fn stop_all(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping all actors");
        }
        stop_in_order(&self.groups);

        if let Some(monitor) = self.monitor.lock().take() {
            let _ = self.events.send(SupervisorEvent::Shutdown);
            if monitor.thread().id() != thread::current().id() && monitor.join().is_err() {
                warn!("Supervisor monitor thread panicked");
            }
        }
    }

    fn failure_sink(&self) -> FailureSink {
        let events = self.events.clone();
        Arc::new(move |failure: ActorFailure| {
            let _ = events.send(SupervisorEvent::Failed(failure));
        })
    }

    fn spawn_monitor(&self) -> Result<(), SupervisorError> {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return Ok(());
        }

        let events = self.events_rx.clone();
        let groups = Arc::clone(&self.groups);
        let failure_handler = Arc::clone(&self.failure_handler);
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("hyphae-supervisor".to_string())
            .spawn(move || {
                while let Ok(event) = events.recv() {
                    let failure = match event {
                        SupervisorEvent::Failed(failure) => failure,
                        SupervisorEvent::Shutdown => break,
                    };
                    error!(
                        actor = %failure.actor,
                        actor_id = %failure.actor_id,
                        reason = %failure.reason,
                        "Supervised actor failed"
                    );

                    let action = panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut handler = failure_handler.lock();
                        (*handler)(&failure)
                    }))
                    .unwrap_or_else(|_| {
                        error!(actor = %failure.actor, "Failure handler panicked; stopping all actors");
                        FailureAction::StopAll
                    });
                    match action {
                        FailureAction::StopAll => {
                            if running.swap(false, Ordering::AcqRel) {
                                warn!(actor = %failure.actor, "Stopping all actors after failure");
                            }
                            stop_in_order(&groups);
                        }
                        FailureAction::Ignore => {
                            warn!(actor = %failure.actor, "Failure ignored; remaining actors keep running");
                        }
                    }
                }
                debug!("Supervisor monitor exited");
            })?;

        *monitor = Some(handle);
        Ok(())
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}
