pub mod channel;
pub mod runtime;

pub use channel::{ChannelConfig, ChannelKind, FullPolicy, WaitTiers, MAX_RING_CAPACITY};
pub use runtime::{ConfigError, Result, RuntimeConfig, Stage, StageConfig};
