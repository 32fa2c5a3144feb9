//! Per-actor counters
//!
//! Plain atomics, readable from any `ActorRef` while the run loop updates
//! them. A summary is logged when the run loop exits.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collected for an actor
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Messages handled successfully
    processed: AtomicU64,

    /// Handler errors routed to the error handler (panics included)
    failures: AtomicU64,

    /// Handler panics caught by the run loop
    panics: AtomicU64,

    /// Messages dropped because no handler was registered for their tag
    unhandled: AtomicU64,

    /// Total handling time in microseconds
    handle_time_us_total: AtomicU64,
}

impl ActorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully handled message
    pub fn record_processed(&self, handle_time_us: u64) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.handle_time_us_total
            .fetch_add(handle_time_us, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unhandled(&self) {
        self.unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    pub fn unhandled(&self) -> u64 {
        self.unhandled.load(Ordering::Relaxed)
    }

    /// Average handling time of successful messages in microseconds
    pub fn handle_time_us_avg(&self) -> u64 {
        let processed = self.processed();
        if processed == 0 {
            return 0;
        }
        self.handle_time_us_total.load(Ordering::Relaxed) / processed
    }

    /// Log metrics summary
    pub fn log_summary(&self, actor: &str) {
        tracing::info!(
            actor,
            processed = self.processed(),
            failures = self.failures(),
            panics = self.panics(),
            unhandled = self.unhandled(),
            handle_time_us_avg = self.handle_time_us_avg(),
            "Actor metrics summary"
        );
    }
}
