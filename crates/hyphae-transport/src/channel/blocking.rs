//! Unbounded mutex + condition variable channel.
//!
//! `send` never drops and never waits for space, so memory grows with any
//! backlog. Latency is higher and less predictable than the ring: use it for
//! monitoring and analytics paths where bursts must never be lost.

use super::metrics::ChannelMetrics;
use super::{EventChannel, EventReceiver, EventSender};
use crate::error::SendError;
use hyphae_protocol::{Event, Tagged};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct State<T: Tagged> {
    queue: VecDeque<Event<T>>,
    closed: bool,
}

/// Unbounded blocking queue
pub struct BlockingChannel<T: Tagged> {
    state: Mutex<State<T>>,
    available: Condvar,
    metrics: ChannelMetrics,
}

impl<T: Tagged> BlockingChannel<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-allocate room for `capacity` events (the queue still grows past it)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            metrics: ChannelMetrics::new(),
        }
    }

    fn take(&self, state: &mut State<T>) -> Option<Event<T>> {
        let event = state.queue.pop_front()?;
        self.metrics
            .record_received(event.age().as_micros().min(u64::MAX as u128) as u64);
        Some(event)
    }
}

impl<T: Tagged> Default for BlockingChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tagged> EventSender<T> for BlockingChannel<T> {
    fn try_send(&self, event: Event<T>) -> Result<(), SendError<T>> {
        {
            let mut state = self.state.lock();
            if state.closed {
                self.metrics.record_reject();
                return Err(SendError::Closed(event));
            }
            state.queue.push_back(event);
        }
        self.metrics.record_sent();
        self.available.notify_one();
        Ok(())
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T: Tagged> EventReceiver<T> for BlockingChannel<T> {
    fn receive(&self) -> Option<Event<T>> {
        let mut state = self.state.lock();
        self.take(&mut state)
    }

    fn receive_blocking(&self) -> Option<Event<T>> {
        let mut state = self.state.lock();
        loop {
            if let Some(event) = self.take(&mut state) {
                return Some(event);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    fn receive_timeout(&self, timeout: Duration) -> Option<Event<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(event) = self.take(&mut state) {
                return Some(event);
            }
            if state.closed {
                return None;
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return self.take(&mut state);
            }
        }
    }
}

impl<T: Tagged> EventChannel<T> for BlockingChannel<T> {
    fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyphae_protocol::message_tag;
    use std::sync::Arc;
    use std::thread;

    message_tag! {
        enum StatTag {
            Stat => "stat",
        }
    }

    #[derive(Debug, PartialEq)]
    struct Stat(u32);

    hyphae_protocol::impl_tagged!(Stat, StatTag, StatTag::Stat);

    #[test]
    fn test_send_never_rejects_while_open() {
        let channel = BlockingChannel::new();
        for i in 0..10_000 {
            assert!(channel.send(Event::new(Stat(i))));
        }
        assert_eq!(channel.len(), 10_000);
        assert_eq!(channel.capacity(), None);
        assert_eq!(channel.metrics().sent(), 10_000);
    }

    #[test]
    fn test_fifo_order() {
        let channel = BlockingChannel::new();
        for i in 0..5 {
            channel.send_payload(Stat(i));
        }
        let received: Vec<u32> = std::iter::from_fn(|| channel.receive())
            .map(|e| e.into_payload().0)
            .collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_receive_blocking_wakes_on_send() {
        let channel = Arc::new(BlockingChannel::new());

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.receive_blocking().map(|e| e.into_payload()))
        };

        thread::sleep(Duration::from_millis(10));
        assert!(channel.send(Event::new(Stat(7))));
        assert_eq!(consumer.join().unwrap(), Some(Stat(7)));
    }

    #[test]
    fn test_close_ends_stream_after_drain() {
        let channel = Arc::new(BlockingChannel::new());
        assert!(channel.send(Event::new(Stat(1))));

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut received = Vec::new();
                while let Some(event) = channel.receive_blocking() {
                    received.push(event.into_payload().0);
                }
                received
            })
        };

        thread::sleep(Duration::from_millis(10));
        channel.close();

        assert_eq!(consumer.join().unwrap(), vec![1]);
        assert!(!channel.send(Event::new(Stat(2))));
        assert_eq!(channel.metrics().rejected(), 1);
    }

    #[test]
    fn test_receive_timeout() {
        let channel = BlockingChannel::<Stat>::new();

        let start = Instant::now();
        assert!(channel.receive_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));

        channel.send(Event::new(Stat(3)));
        assert_eq!(
            channel
                .receive_timeout(Duration::from_millis(20))
                .map(|e| e.into_payload()),
            Some(Stat(3))
        );
    }
}
