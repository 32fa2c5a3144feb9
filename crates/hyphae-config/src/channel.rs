//! Channel construction settings
//!
//! - Which channel implementation backs a pipeline stage
//! - Ring capacity and the policy applied when the ring is full
//! - Wait tiers (spin, yield, park) used by blocking ring operations

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Channel implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Mutex + condition variable queue (unbounded, never drops)
    Blocking,

    /// Lock-free power-of-two ring (bounded, full policy applies)
    Ring,
}

impl Default for ChannelKind {
    fn default() -> Self {
        ChannelKind::Ring
    }
}

/// Policy for handling writes when a ring is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FullPolicy {
    /// Evict the oldest unread event and accept the new one
    ///
    /// Best for: market data, where the latest quote matters most
    DiscardOldest,

    /// Reject the new event (`send` returns `false`)
    ///
    /// Best for: order flow, where the caller must decide to retry or fail
    DiscardNewest,

    /// Wait through the wait tiers until space is available
    ///
    /// Best for: pipelines where the producer can afford to stall
    Block,
}

impl Default for FullPolicy {
    fn default() -> Self {
        FullPolicy::DiscardNewest
    }
}

/// Progressive waiting strategy: busy-spin, then yield, then timed park.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WaitTiers {
    /// Busy-spin iterations before yielding
    pub spin_iters: u32,

    /// `thread::yield_now` iterations before parking
    pub yield_iters: u32,

    /// Duration of each timed park, in nanoseconds
    pub park_ns: u64,
}

impl Default for WaitTiers {
    fn default() -> Self {
        Self {
            spin_iters: 128,
            yield_iters: 32,
            park_ns: 50_000,
        }
    }
}

impl WaitTiers {
    /// Tiers for a latency-critical consumer with a dedicated core
    pub fn low_latency() -> Self {
        Self {
            spin_iters: 4096,
            yield_iters: 256,
            park_ns: 10_000,
        }
    }

    /// Tiers for an idle-tolerant consumer that should not burn CPU
    pub fn relaxed() -> Self {
        Self {
            spin_iters: 16,
            yield_iters: 8,
            park_ns: 500_000,
        }
    }

    /// Park duration as a `Duration`
    pub fn park_duration(&self) -> Duration {
        Duration::from_nanos(self.park_ns)
    }
}

/// Settings for one event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub kind: ChannelKind,

    /// Requested capacity; rings round this up to the next power of two.
    /// Ignored by blocking channels.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub full_policy: FullPolicy,

    #[serde(default)]
    pub wait: WaitTiers,
}

/// Largest ring a config may request. Every slot is allocated up front.
pub const MAX_RING_CAPACITY: usize = 1 << 24;

fn default_capacity() -> usize {
    1024
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: ChannelKind::Ring,
            capacity: default_capacity(),
            full_policy: FullPolicy::default(),
            wait: WaitTiers::default(),
        }
    }
}

impl ChannelConfig {
    /// Ring channel with the given capacity and full policy
    pub fn ring(capacity: usize, full_policy: FullPolicy) -> Self {
        Self {
            kind: ChannelKind::Ring,
            capacity,
            full_policy,
            wait: WaitTiers::default(),
        }
    }

    /// Unbounded blocking channel
    pub fn blocking() -> Self {
        Self {
            kind: ChannelKind::Blocking,
            ..Default::default()
        }
    }

    /// Set the wait tiers
    pub fn with_wait(mut self, wait: WaitTiers) -> Self {
        self.wait = wait;
        self
    }

    /// Set the full policy
    pub fn with_full_policy(mut self, full_policy: FullPolicy) -> Self {
        self.full_policy = full_policy;
        self
    }

    /// Capacity actually allocated by a ring built from this config
    pub fn ring_capacity(&self) -> usize {
        self.capacity.clamp(1, MAX_RING_CAPACITY).next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_policy_default() {
        assert_eq!(FullPolicy::default(), FullPolicy::DiscardNewest);
    }

    #[test]
    fn test_ring_capacity_rounds_up() {
        assert_eq!(ChannelConfig::ring(4, FullPolicy::Block).ring_capacity(), 4);
        assert_eq!(ChannelConfig::ring(5, FullPolicy::Block).ring_capacity(), 8);
        assert_eq!(ChannelConfig::ring(1000, FullPolicy::Block).ring_capacity(), 1024);
        assert_eq!(ChannelConfig::ring(0, FullPolicy::Block).ring_capacity(), 1);
        assert_eq!(
            ChannelConfig::ring(usize::MAX, FullPolicy::Block).ring_capacity(),
            MAX_RING_CAPACITY
        );
    }

    #[test]
    fn test_channel_config_builder() {
        let config = ChannelConfig::ring(64, FullPolicy::DiscardNewest)
            .with_full_policy(FullPolicy::DiscardOldest)
            .with_wait(WaitTiers::low_latency());

        assert_eq!(config.kind, ChannelKind::Ring);
        assert_eq!(config.capacity, 64);
        assert_eq!(config.full_policy, FullPolicy::DiscardOldest);
        assert_eq!(config.wait.spin_iters, 4096);
    }

    #[test]
    fn test_parse_channel_config() {
        let toml = r#"
            kind = "ring"
            capacity = 256
            full_policy = "discard_oldest"

            [wait]
            spin_iters = 10
        "#;

        let config: ChannelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.kind, ChannelKind::Ring);
        assert_eq!(config.capacity, 256);
        assert_eq!(config.full_policy, FullPolicy::DiscardOldest);
        assert_eq!(config.wait.spin_iters, 10);
        assert_eq!(config.wait.yield_iters, WaitTiers::default().yield_iters);
    }

    #[test]
    fn test_blocking_config() {
        let config = ChannelConfig::blocking();
        assert_eq!(config.kind, ChannelKind::Blocking);
    }
}
