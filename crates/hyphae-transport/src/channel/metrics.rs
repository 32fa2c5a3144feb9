//! Channel counters for monitoring and observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by every channel
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Events accepted by the channel
    sent: AtomicU64,

    /// Events handed to a consumer
    received: AtomicU64,

    /// Events evicted by the discard-oldest policy
    dropped: AtomicU64,

    /// Sends rejected (full under discard-newest, or closed)
    rejected: AtomicU64,

    /// Maximum queueing latency observed (microseconds)
    max_latency_us: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self, latency_us: u64) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.update_max_latency(latency_us);
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Update max latency
    pub fn update_max_latency(&self, latency_us: u64) {
        let mut current = self.max_latency_us.load(Ordering::Relaxed);
        while latency_us > current {
            match self.max_latency_us.compare_exchange_weak(
                current,
                latency_us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn max_latency_us(&self) -> u64 {
        self.max_latency_us.load(Ordering::Relaxed)
    }

    /// Get the drop rate (dropped / sent)
    pub fn drop_rate(&self) -> f64 {
        let sent = self.sent();
        if sent == 0 {
            0.0
        } else {
            self.dropped() as f64 / sent as f64
        }
    }

    /// Point-in-time copy of every counter plus the channel's current
    /// `depth`, which only the channel itself knows
    pub fn snapshot(&self, depth: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            depth,
            sent: self.sent(),
            received: self.received(),
            dropped: self.dropped(),
            rejected: self.rejected(),
            max_latency_us: self.max_latency_us(),
        }
    }
}

/// Plain copy of [`ChannelMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Events buffered when the snapshot was taken
    pub depth: usize,
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub max_latency_us: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} queued, {} sent, {} received, {} dropped, {} rejected, max latency {}us",
            self.depth,
            self.sent, self.received, self.dropped, self.rejected, self.max_latency_us
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_metrics() {
        let metrics = ChannelMetrics::new();

        metrics.record_sent();
        metrics.record_sent();
        metrics.record_sent();
        assert_eq!(metrics.sent(), 3);

        metrics.record_drop();
        assert_eq!(metrics.dropped(), 1);

        metrics.record_reject();
        assert_eq!(metrics.rejected(), 1);

        metrics.record_received(100);
        assert_eq!(metrics.received(), 1);
        assert_eq!(metrics.max_latency_us(), 100);

        metrics.record_received(50); // Should not lower the max
        assert_eq!(metrics.max_latency_us(), 100);

        metrics.update_max_latency(200);
        assert_eq!(metrics.max_latency_us(), 200);
    }

    #[test]
    fn test_drop_rate() {
        let metrics = ChannelMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..10 {
            metrics.record_sent();
        }
        metrics.record_drop();
        metrics.record_drop();

        assert_eq!(metrics.drop_rate(), 0.2);
    }

    #[test]
    fn test_snapshot_display() {
        let metrics = ChannelMetrics::new();
        metrics.record_sent();
        metrics.record_received(7);

        let snapshot = metrics.snapshot(3);
        assert_eq!(snapshot.depth, 3);
        assert_eq!(snapshot.sent, 1);
        assert_eq!(snapshot.received, 1);
        assert_eq!(
            snapshot.to_string(),
            "3 queued, 1 sent, 1 received, 0 dropped, 0 rejected, max latency 7us"
        );
    }
}
