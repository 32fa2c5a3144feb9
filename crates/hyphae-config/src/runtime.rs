use crate::channel::{ChannelConfig, ChannelKind, FullPolicy, WaitTiers, MAX_RING_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Pipeline stage a channel or actor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Gateways decoding exchange feeds
    MarketData,

    /// Strategy actors consuming market data
    Strategy,

    /// Execution actors sending orders to trade gateways
    Execution,

    /// Non-critical analytics and monitoring sinks
    Monitoring,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MarketData => "market_data",
            Stage::Strategy => "strategy",
            Stage::Execution => "execution",
            Stage::Monitoring => "monitoring",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for every channel and actor of one pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageConfig {
    #[serde(default)]
    pub channel: ChannelConfig,

    /// How long `stop()` waits for a run loop to exit before detaching it
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Upper bound on how long a run loop sleeps on an empty mailbox
    /// before re-checking its status
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_stop_grace_ms() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            stop_grace_ms: default_stop_grace_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl StageConfig {
    /// Market data: freshness over completeness
    pub fn market_data() -> Self {
        Self {
            channel: ChannelConfig::ring(4096, FullPolicy::DiscardOldest)
                .with_wait(WaitTiers::low_latency()),
            ..Default::default()
        }
    }

    /// Strategies: bounded, a full mailbox rejects new messages
    pub fn strategy() -> Self {
        Self {
            channel: ChannelConfig::ring(1024, FullPolicy::DiscardNewest),
            ..Default::default()
        }
    }

    /// Execution: completeness over freshness, reject rather than drop
    pub fn execution() -> Self {
        Self {
            channel: ChannelConfig::ring(1024, FullPolicy::DiscardNewest)
                .with_wait(WaitTiers::low_latency()),
            ..Default::default()
        }
    }

    /// Monitoring: unbounded, latency is secondary
    pub fn monitoring() -> Self {
        Self {
            channel: ChannelConfig::blocking().with_wait(WaitTiers::relaxed()),
            stop_grace_ms: 500,
            poll_interval_ms: 100,
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level runtime configuration, owned by the supervisor.
///
/// Replaces process-wide pool settings: every queue depth, full policy and
/// wait tier lives here and is handed to the supervisor at construction.
///
/// ```toml
/// default_ask_timeout_ms = 250
///
/// [market_data.channel]
/// kind = "ring"
/// capacity = 8192
/// full_policy = "discard_oldest"
///
/// [execution]
/// stop_grace_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_ask_timeout_ms")]
    pub default_ask_timeout_ms: u64,

    #[serde(default = "StageConfig::market_data")]
    pub market_data: StageConfig,

    #[serde(default = "StageConfig::strategy")]
    pub strategy: StageConfig,

    #[serde(default = "StageConfig::execution")]
    pub execution: StageConfig,

    #[serde(default = "StageConfig::monitoring")]
    pub monitoring: StageConfig,
}

fn default_ask_timeout_ms() -> u64 {
    1_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_ask_timeout_ms: default_ask_timeout_ms(),
            market_data: StageConfig::market_data(),
            strategy: StageConfig::strategy(),
            execution: StageConfig::execution(),
            monitoring: StageConfig::monitoring(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate runtime configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for a pipeline stage
    pub fn stage(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::MarketData => &self.market_data,
            Stage::Strategy => &self.strategy,
            Stage::Execution => &self.execution,
            Stage::Monitoring => &self.monitoring,
        }
    }

    pub fn default_ask_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ask_timeout_ms)
    }

    /// Validate the runtime configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_ask_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "default_ask_timeout_ms must be greater than zero".to_string(),
            ));
        }

        for stage in [
            Stage::MarketData,
            Stage::Strategy,
            Stage::Execution,
            Stage::Monitoring,
        ] {
            let settings = self.stage(stage);

            if settings.channel.kind == ChannelKind::Ring && settings.channel.capacity == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "Stage {} has a ring channel with zero capacity",
                    stage
                )));
            }

            if settings.channel.kind == ChannelKind::Ring
                && settings.channel.capacity > MAX_RING_CAPACITY
            {
                return Err(ConfigError::InvalidConfig(format!(
                    "Stage {} ring capacity {} exceeds the maximum of {}",
                    stage, settings.channel.capacity, MAX_RING_CAPACITY
                )));
            }

            if settings.poll_interval_ms == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "Stage {} has a zero poll interval",
                    stage
                )));
            }

            let wait = settings.channel.wait;
            if wait.spin_iters == 0 && wait.yield_iters == 0 && wait.park_ns == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "Stage {} has wait tiers that never back off",
                    stage
                )));
            }
        }

        // Order flow must fail loudly rather than lose commands
        if self.execution.channel.kind == ChannelKind::Ring
            && self.execution.channel.full_policy == FullPolicy::DiscardOldest
        {
            return Err(ConfigError::InvalidConfig(
                "Execution stage cannot use the discard_oldest full policy".to_string(),
            ));
        }

        Ok(())
    }
}
