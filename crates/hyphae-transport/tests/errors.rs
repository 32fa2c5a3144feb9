//! A single bad message never takes an actor down

mod common;

use common::{init_tracing, wait_for, Query, QueryKind, QueryTag};
use hyphae_protocol::Event;
use hyphae_transport::{
    Actor, ActorStatus, BlockingChannel, ChannelMetrics, Directive, EventChannel, EventReceiver,
    EventSender, HandlerError, SendError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[test]
fn test_failure_on_second_of_three() {
    init_tracing();
    let processed = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(AtomicUsize::new(0));

    let actor = {
        let processed = Arc::clone(&processed);
        let errors = Arc::clone(&errors);
        Actor::<Query>::builder("echo")
            .handle_with(move |query, _| {
                let QueryKind::Echo { value } = query.kind else {
                    return Ok(());
                };
                anyhow::ensure!(value != 2, "cannot price message {value}");
                processed.lock().push(value);
                Ok(())
            })
            .on_error(move |err: &HandlerError| {
                assert!(matches!(err, HandlerError::Failed(_)));
                errors.fetch_add(1, Ordering::SeqCst);
                Directive::Resume
            })
            .build()
    };
    actor.start().unwrap();

    for value in 1..=3 {
        actor.tell(Query::echo(value)).unwrap();
    }

    wait_for(|| processed.lock().len() == 2);
    assert_eq!(*processed.lock(), vec![1, 3]);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(actor.status(), ActorStatus::Running);

    let metrics = actor.actor_ref();
    assert_eq!(metrics.metrics().processed(), 2);
    assert_eq!(metrics.metrics().failures(), 1);
    actor.stop();
}

#[test]
fn test_panic_on_second_of_three() {
    init_tracing();
    let processed = Arc::new(Mutex::new(Vec::new()));
    let actor = {
        let processed = Arc::clone(&processed);
        Actor::<Query>::builder("echo")
            .handle_with(move |query, _| {
                if let QueryKind::Echo { value } = query.kind {
                    if value == 2 {
                        panic!("corrupt book for message {value}");
                    }
                    processed.lock().push(value);
                }
                Ok(())
            })
            .build()
    };
    actor.start().unwrap();

    for value in 1..=3 {
        actor.tell(Query::echo(value)).unwrap();
    }

    wait_for(|| processed.lock().len() == 2);
    assert_eq!(*processed.lock(), vec![1, 3]);
    assert_eq!(actor.actor_ref().metrics().panics(), 1);
    assert!(actor.is_running());
    actor.stop();
}

#[test]
fn test_unregistered_tag_is_dropped() {
    init_tracing();
    let echoes = Arc::new(AtomicUsize::new(0));
    let actor = {
        let echoes = Arc::clone(&echoes);
        Actor::<Query>::builder("echo-only")
            .on(QueryTag::Echo, move |_, _| {
                echoes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_error(|_: &HandlerError| Directive::Escalate)
            .build()
    };
    actor.start().unwrap();

    actor.tell(Query::mid("ETH-USDT")).unwrap();
    actor.tell(Query::echo(1)).unwrap();

    wait_for(|| echoes.load(Ordering::SeqCst) == 1);
    assert_eq!(actor.actor_ref().metrics().unhandled(), 1);
    assert!(actor.is_running());
    actor.stop();
}

#[test]
fn test_stop_discards_queued_messages() {
    init_tracing();
    let gate = Arc::new(Mutex::new(()));
    let handled = Arc::new(AtomicUsize::new(0));
    let held = gate.lock();

    let actor = {
        let gate = Arc::clone(&gate);
        let handled = Arc::clone(&handled);
        Actor::<Query>::builder("gated")
            .handle_with(move |_, _| {
                let _open = gate.lock();
                handled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
    };
    actor.start().unwrap();

    for value in 0..10 {
        actor.tell(Query::echo(value)).unwrap();
    }
    let actor_ref = actor.actor_ref();
    wait_for(|| actor_ref.mailbox_len() == 9);

    let stopper = std::thread::spawn({
        let actor = Arc::new(actor);
        move || {
            actor.stop();
            actor.status()
        }
    });
    wait_for(|| actor_ref.status() == ActorStatus::Stopped);
    drop(held);

    assert_eq!(stopper.join().unwrap(), ActorStatus::Stopped);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(actor_ref.mailbox_len(), 0);
}

/// Mailbox that stops its actor after a message is taken out but before
/// the run loop gets to dispatch it
struct StopAfterReceive {
    inner: BlockingChannel<Query>,
    actor: OnceLock<Arc<Actor<Query>>>,
    stopper: Mutex<Option<JoinHandle<()>>>,
}

impl EventSender<Query> for StopAfterReceive {
    fn try_send(&self, event: Event<Query>) -> Result<(), SendError<Query>> {
        self.inner.try_send(event)
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl EventReceiver<Query> for StopAfterReceive {
    fn receive(&self) -> Option<Event<Query>> {
        self.inner.receive()
    }

    fn receive_blocking(&self) -> Option<Event<Query>> {
        self.inner.receive_blocking()
    }

    fn receive_timeout(&self, timeout: Duration) -> Option<Event<Query>> {
        let event = self.inner.receive_timeout(timeout)?;
        if let Some(actor) = self.actor.get() {
            let actor_ref = actor.actor_ref();
            let actor = Arc::clone(actor);
            *self.stopper.lock() = Some(thread::spawn(move || actor.stop()));
            wait_for(|| actor_ref.status() == ActorStatus::Stopped);
        }
        Some(event)
    }
}

impl EventChannel<Query> for StopAfterReceive {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn metrics(&self) -> &ChannelMetrics {
        self.inner.metrics()
    }
}

#[test]
fn test_stop_during_receive_skips_dispatch() {
    init_tracing();
    let handled = Arc::new(AtomicUsize::new(0));
    let mailbox = Arc::new(StopAfterReceive {
        inner: BlockingChannel::new(),
        actor: OnceLock::new(),
        stopper: Mutex::new(None),
    });

    let actor = {
        let handled = Arc::clone(&handled);
        Arc::new(
            Actor::<Query>::builder("late-stop")
                .mailbox(Arc::clone(&mailbox) as Arc<dyn EventChannel<Query>>)
                .handle_with(move |_, _| {
                    handled.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .build(),
        )
    };
    assert!(mailbox.actor.set(Arc::clone(&actor)).is_ok());
    actor.start().unwrap();

    actor.tell(Query::echo(1)).unwrap();
    wait_for(|| mailbox.stopper.lock().is_some());
    let stopper = mailbox.stopper.lock().take();
    stopper.unwrap().join().unwrap();

    assert_eq!(actor.status(), ActorStatus::Stopped);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}
