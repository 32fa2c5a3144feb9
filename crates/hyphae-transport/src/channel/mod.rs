//! Event channels: typed, in-process transports from producers to consumers.
//!
//! | Channel | Bound | Producers | Full behavior | Use case |
//! |---------|-------|-----------|---------------|----------|
//! | [`RingChannel`] | power-of-two ring | many (CAS) | [`FullPolicy`] | mailboxes, order flow |
//! | [`RingProducer`]/[`RingConsumer`] | power-of-two ring | one (plain store) | [`FullPolicy`] | market-data feed hot path |
//! | [`BlockingChannel`] | unbounded | many (mutex) | never full | monitoring, analytics |
//!
//! `send` returning `false` is the only backpressure signal: callers must
//! decide whether to retry, drop or count.

mod blocking;
mod metrics;
mod ring;
mod wait;

pub use blocking::BlockingChannel;
pub use metrics::{ChannelMetrics, MetricsSnapshot};
pub use ring::{RingChannel, RingConsumer, RingProducer};
pub use wait::Backoff;

use crate::error::SendError;
use hyphae_config::{ChannelConfig, ChannelKind, FullPolicy};
use hyphae_protocol::{Event, Tagged};
use std::sync::Arc;
use std::time::Duration;

/// Producer side of a channel
pub trait EventSender<T: Tagged>: Send {
    /// Place an event in the channel, handing it back if rejected
    fn try_send(&self, event: Event<T>) -> Result<(), SendError<T>>;

    /// Single attempt that never waits for space: a full ring rejects the
    /// event with `SendError::Full` even under [`FullPolicy::Block`].
    /// Channels that never wait (blocking queues) just `try_send`.
    fn try_send_now(&self, event: Event<T>) -> Result<(), SendError<T>> {
        self.try_send(event)
    }

    /// Place an event in the channel.
    ///
    /// Returns `false` if the full policy rejected it or the channel is
    /// closed. Only blocks for rings configured with [`FullPolicy::Block`].
    fn send(&self, event: Event<T>) -> bool {
        self.try_send(event).is_ok()
    }

    /// Wrap a payload in an [`Event`] and send it
    fn send_payload(&self, payload: T) -> bool {
        self.send(Event::new(payload))
    }

    /// Reject further sends; receivers drain what is left, then see end of stream
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Consumer side of a channel
pub trait EventReceiver<T: Tagged>: Send {
    /// Take the next event without waiting
    fn receive(&self) -> Option<Event<T>>;

    /// Wait for the next event.
    ///
    /// Returns `None` once the channel is closed and drained (end of stream).
    fn receive_blocking(&self) -> Option<Event<T>>;

    /// Wait for the next event for at most `timeout`
    fn receive_timeout(&self, timeout: Duration) -> Option<Event<T>>;
}

/// A channel shareable between threads (both ends behind one handle)
pub trait EventChannel<T: Tagged>: EventSender<T> + EventReceiver<T> + Sync {
    /// Number of events waiting to be received
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered events (`None` = unbounded)
    fn capacity(&self) -> Option<usize>;

    fn metrics(&self) -> &ChannelMetrics;

    /// Counters together with the current depth
    fn snapshot(&self) -> MetricsSnapshot {
        self.metrics().snapshot(self.len())
    }
}

/// Build a shareable channel from its configuration.
///
/// `ChannelKind::Ring` yields a [`RingChannel`] (multi-producer safe, since
/// the handle can be cloned across threads). Use [`RingChannel::split`] for a
/// dedicated single-producer feed.
pub fn new_channel<T: Tagged>(config: &ChannelConfig) -> Arc<dyn EventChannel<T>> {
    match config.kind {
        ChannelKind::Blocking => Arc::new(BlockingChannel::with_capacity(config.capacity)),
        ChannelKind::Ring => Arc::new(RingChannel::new(config)),
    }
}

/// Human-readable summary of a channel's configuration, for logs
pub fn describe(config: &ChannelConfig) -> String {
    match config.kind {
        ChannelKind::Blocking => "blocking(unbounded)".to_string(),
        ChannelKind::Ring => {
            let policy = match config.full_policy {
                FullPolicy::DiscardOldest => "discard_oldest",
                FullPolicy::DiscardNewest => "discard_newest",
                FullPolicy::Block => "block",
            };
            format!("ring({}, {})", config.ring_capacity(), policy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyphae_protocol::message_tag;

    message_tag! {
        enum QuoteTag {
            Quote => "quote",
        }
    }

    struct Quote(u32);

    hyphae_protocol::impl_tagged!(Quote, QuoteTag, QuoteTag::Quote);

    #[test]
    fn test_new_channel_ring() {
        let channel = new_channel::<Quote>(&ChannelConfig::ring(100, FullPolicy::DiscardNewest));
        assert_eq!(channel.capacity(), Some(128));
        assert!(channel.send_payload(Quote(1)));
        assert!(channel.send_payload(Quote(2)));
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.snapshot().depth, 2);
        assert_eq!(channel.receive().map(|e| e.into_payload().0), Some(1));

        let snapshot = channel.snapshot();
        assert_eq!(snapshot.depth, 1);
        assert_eq!(snapshot.sent, 2);
        assert_eq!(snapshot.received, 1);
    }

    #[test]
    fn test_new_channel_blocking() {
        let channel = new_channel::<Quote>(&ChannelConfig::blocking());
        assert_eq!(channel.capacity(), None);
        assert!(channel.is_empty());
        channel.close();
        assert!(channel.is_closed());
        assert!(!channel.send_payload(Quote(1)));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&ChannelConfig::ring(1000, FullPolicy::DiscardOldest)),
            "ring(1024, discard_oldest)"
        );
        assert_eq!(describe(&ChannelConfig::blocking()), "blocking(unbounded)");
    }
}
