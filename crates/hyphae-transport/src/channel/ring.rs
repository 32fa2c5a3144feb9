//! Lock-free ring buffer channels.
//!
//! The backing store is an array of slots whose length is rounded up to a
//! power of two, so a position maps to a slot with `pos & mask`. Two cursors
//! (`head` for reads, `tail` for writes) grow monotonically and each lives on
//! its own cache line to avoid false sharing between producer and consumer
//! cores.
//!
//! Every slot carries a sequence stamp. For a position `pos` the stamp is:
//! - `pos` when the slot is free for the write at `pos`
//! - `pos + 1` once the event at `pos` is published (Release after the
//!   payload write, paired with the consumer's Acquire load)
//! - `pos + capacity` after the consumer takes it, freeing it for the next lap
//!
//! Two producer flavours share this core:
//! - [`RingChannel`]: claims `tail` with compare-and-swap, safe for many
//!   producers. A lost CAS retries the whole check and never drops the event.
//! - [`RingProducer`]: single producer, advances `tail` with a plain store.
//!   It is neither `Clone` nor `Sync`, so only one thread can ever write.
//!
//! Reads always claim `head` with compare-and-swap because a discard-oldest
//! producer evicts from the head while the consumer is reading.

use super::metrics::{ChannelMetrics, MetricsSnapshot};
use super::wait::Backoff;
use super::{EventChannel, EventReceiver, EventSender};
use crate::error::SendError;
use hyphae_config::{ChannelConfig, FullPolicy, WaitTiers};
use hyphae_protocol::{Event, Tagged};
use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cursor padded out to its own pair of cache lines (adjacent-line
/// prefetchers pull lines in 128-byte pairs).
#[repr(C, align(128))]
struct PaddedCursor {
    pos: AtomicUsize,
}

impl PaddedCursor {
    fn new() -> Self {
        Self {
            pos: AtomicUsize::new(0),
        }
    }
}

struct Slot<T: Tagged> {
    stamp: AtomicUsize,
    event: UnsafeCell<MaybeUninit<Event<T>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// Only one producer exists; `tail` is advanced with a plain store
    Exclusive,
    /// Producers race for `tail` with compare-and-swap
    Shared,
}

struct RingCore<T: Tagged> {
    /// Next position to read
    head: PaddedCursor,
    /// Next position to write
    tail: PaddedCursor,
    slots: Box<[Slot<T>]>,
    mask: usize,
    capacity: usize,
    full_policy: FullPolicy,
    wait: WaitTiers,
    closed: AtomicBool,
    metrics: ChannelMetrics,
}

// Safety: slot contents are only touched by the thread that won the slot's
// position (stamp protocol above); events themselves are `Send`.
unsafe impl<T: Tagged> Send for RingCore<T> {}
unsafe impl<T: Tagged> Sync for RingCore<T> {}

impl<T: Tagged> RingCore<T> {
    fn new(config: &ChannelConfig) -> Self {
        let capacity = config.ring_capacity();
        let slots = (0..capacity)
            .map(|i| Slot {
                stamp: AtomicUsize::new(i),
                event: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            head: PaddedCursor::new(),
            tail: PaddedCursor::new(),
            slots,
            mask: capacity - 1,
            capacity,
            full_policy: config.full_policy,
            wait: config.wait,
            closed: AtomicBool::new(false),
            metrics: ChannelMetrics::new(),
        }
    }

    /// Write `event` at the tail. With `may_wait == false` a full `Block`
    /// ring rejects instead of waiting for space.
    fn push(&self, event: Event<T>, claim: Claim, may_wait: bool) -> Result<(), SendError<T>> {
        let mut backoff = Backoff::new(self.wait);
        let mut pos = self.tail.pos.load(Ordering::Relaxed);

        loop {
            if self.closed.load(Ordering::Acquire) {
                self.metrics.record_reject();
                return Err(SendError::Closed(event));
            }

            let slot = &self.slots[pos & self.mask];
            let stamp = slot.stamp.load(Ordering::Acquire);
            let lag = stamp.wrapping_sub(pos) as isize;

            if lag == 0 {
                match claim {
                    Claim::Exclusive => {
                        self.tail.pos.store(pos.wrapping_add(1), Ordering::Relaxed);
                    }
                    Claim::Shared => {
                        if let Err(actual) = self.tail.pos.compare_exchange_weak(
                            pos,
                            pos.wrapping_add(1),
                            Ordering::Relaxed,
                            Ordering::Relaxed,
                        ) {
                            // Lost the race: redo the full check at the new tail
                            pos = actual;
                            continue;
                        }
                    }
                }

                // Safety: winning `pos` gives exclusive access to this slot
                // until the stamp below publishes it.
                unsafe {
                    (*slot.event.get()).write(event);
                }
                slot.stamp.store(pos.wrapping_add(1), Ordering::Release);
                self.metrics.record_sent();
                return Ok(());
            }

            if lag < 0 {
                // The slot still holds the event from the previous lap
                let head = self.head.pos.load(Ordering::Acquire);
                let used = pos.wrapping_sub(head) as isize;

                if used >= self.capacity as isize {
                    match self.full_policy {
                        FullPolicy::DiscardNewest => {
                            self.metrics.record_reject();
                            return Err(SendError::Full(event));
                        }
                        FullPolicy::DiscardOldest => {
                            if self.pop().is_some() {
                                self.metrics.record_drop();
                            }
                        }
                        FullPolicy::Block if may_wait => backoff.snooze(),
                        FullPolicy::Block => {
                            self.metrics.record_reject();
                            return Err(SendError::Full(event));
                        }
                    }
                } else {
                    // A consumer claimed the slot but has not released it yet
                    std::hint::spin_loop();
                }
            }

            pos = self.tail.pos.load(Ordering::Relaxed);
        }
    }

    fn pop(&self) -> Option<Event<T>> {
        let mut pos = self.head.pos.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[pos & self.mask];
            let stamp = slot.stamp.load(Ordering::Acquire);
            let lag = stamp.wrapping_sub(pos.wrapping_add(1)) as isize;

            if lag == 0 {
                match self.head.pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Safety: the stamp says the event at `pos` is
                        // published and the CAS made us its only reader.
                        let event = unsafe { (*slot.event.get()).assume_init_read() };
                        slot.stamp
                            .store(pos.wrapping_add(self.capacity), Ordering::Release);
                        return Some(event);
                    }
                    Err(actual) => pos = actual,
                }
            } else if lag < 0 {
                // Nothing published at `pos` yet
                return None;
            } else {
                pos = self.head.pos.load(Ordering::Relaxed);
            }
        }
    }

    fn receive(&self) -> Option<Event<T>> {
        let event = self.pop()?;
        self.metrics
            .record_received(event.age().as_micros().min(u64::MAX as u128) as u64);
        Some(event)
    }

    fn receive_blocking(&self) -> Option<Event<T>> {
        let mut backoff = Backoff::new(self.wait);
        loop {
            if let Some(event) = self.receive() {
                return Some(event);
            }
            if self.is_closed() {
                // Drain anything published just before the close
                return self.receive();
            }
            backoff.snooze();
        }
    }

    fn receive_timeout(&self, timeout: Duration) -> Option<Event<T>> {
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::new(self.wait);
        loop {
            if let Some(event) = self.receive() {
                return Some(event);
            }
            if self.is_closed() || !backoff.snooze_until(deadline) {
                return self.receive();
            }
        }
    }

    fn len(&self) -> usize {
        let head = self.head.pos.load(Ordering::Acquire);
        let tail = self.tail.pos.load(Ordering::Acquire);
        let used = tail.wrapping_sub(head) as isize;
        used.clamp(0, self.capacity as isize) as usize
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T: Tagged> Drop for RingCore<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Bounded lock-free ring, safe for many producers and consumers.
///
/// Used as an actor mailbox or wherever the sending side is shared. For a
/// dedicated point-to-point feed, [`RingChannel::split`] returns the cheaper
/// single-producer pair.
///
/// # Example
///
/// ```rust
/// use hyphae_config::{ChannelConfig, FullPolicy};
/// use hyphae_protocol::{message_tag, Event, Tagged};
/// use hyphae_transport::channel::{EventReceiver, EventSender, RingChannel};
///
/// message_tag! {
///     pub enum TickTag {
///         Tick => "tick",
///     }
/// }
///
/// struct Tick(u64);
///
/// impl Tagged for Tick {
///     type Tag = TickTag;
///     fn tag(&self) -> TickTag {
///         TickTag::Tick
///     }
/// }
///
/// let ring = RingChannel::new(&ChannelConfig::ring(4, FullPolicy::DiscardOldest));
/// for i in 1..=6 {
///     assert!(ring.send(Event::new(Tick(i))));
/// }
///
/// let received: Vec<u64> = std::iter::from_fn(|| ring.receive())
///     .map(|event| event.into_payload().0)
///     .collect();
/// assert_eq!(received, vec![3, 4, 5, 6]);
/// ```
pub struct RingChannel<T: Tagged> {
    core: RingCore<T>,
}

impl<T: Tagged> RingChannel<T> {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            core: RingCore::new(config),
        }
    }

    /// Build a single-producer, single-consumer ring.
    ///
    /// Dropping either half closes the ring.
    pub fn split(config: &ChannelConfig) -> (RingProducer<T>, RingConsumer<T>) {
        let core = Arc::new(RingCore::new(config));
        (
            RingProducer {
                core: Arc::clone(&core),
                _not_sync: PhantomData,
            },
            RingConsumer {
                core,
                _not_sync: PhantomData,
            },
        )
    }

    pub fn full_policy(&self) -> FullPolicy {
        self.core.full_policy
    }
}

impl<T: Tagged> EventSender<T> for RingChannel<T> {
    fn try_send(&self, event: Event<T>) -> Result<(), SendError<T>> {
        self.core.push(event, Claim::Shared, true)
    }

    fn try_send_now(&self, event: Event<T>) -> Result<(), SendError<T>> {
        self.core.push(event, Claim::Shared, false)
    }

    fn close(&self) {
        self.core.close();
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl<T: Tagged> EventReceiver<T> for RingChannel<T> {
    fn receive(&self) -> Option<Event<T>> {
        self.core.receive()
    }

    fn receive_blocking(&self) -> Option<Event<T>> {
        self.core.receive_blocking()
    }

    fn receive_timeout(&self, timeout: Duration) -> Option<Event<T>> {
        self.core.receive_timeout(timeout)
    }
}

impl<T: Tagged> EventChannel<T> for RingChannel<T> {
    fn len(&self) -> usize {
        self.core.len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.core.capacity)
    }

    fn metrics(&self) -> &ChannelMetrics {
        &self.core.metrics
    }
}

/// Writing half of a single-producer ring
pub struct RingProducer<T: Tagged> {
    core: Arc<RingCore<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T: Tagged> RingProducer<T> {
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.core.capacity
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.core.metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot(self.core.len())
    }
}

impl<T: Tagged> EventSender<T> for RingProducer<T> {
    fn try_send(&self, event: Event<T>) -> Result<(), SendError<T>> {
        self.core.push(event, Claim::Exclusive, true)
    }

    fn try_send_now(&self, event: Event<T>) -> Result<(), SendError<T>> {
        self.core.push(event, Claim::Exclusive, false)
    }

    fn close(&self) {
        self.core.close();
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl<T: Tagged> Drop for RingProducer<T> {
    fn drop(&mut self) {
        self.core.close();
    }
}

/// Reading half of a single-producer ring
pub struct RingConsumer<T: Tagged> {
    core: Arc<RingCore<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T: Tagged> RingConsumer<T> {
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.core.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.core.metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot(self.core.len())
    }
}

impl<T: Tagged> EventReceiver<T> for RingConsumer<T> {
    fn receive(&self) -> Option<Event<T>> {
        self.core.receive()
    }

    fn receive_blocking(&self) -> Option<Event<T>> {
        self.core.receive_blocking()
    }

    fn receive_timeout(&self, timeout: Duration) -> Option<Event<T>> {
        self.core.receive_timeout(timeout)
    }
}

impl<T: Tagged> Drop for RingConsumer<T> {
    fn drop(&mut self) {
        self.core.close();
    }
}
