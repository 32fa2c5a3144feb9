//! Common test utilities and shared message types
#![allow(dead_code)]

use hyphae_protocol::{message_tag, Correlatable, CorrelationId, Tagged};
use std::thread;
use std::time::{Duration, Instant};

message_tag! {
    pub enum QueryTag {
        Mid => "query.mid",
        Echo => "query.echo",
        Slow => "query.slow",
        Silent => "query.silent",
    }
}

/// Request messages used by the ask/tell tests
#[derive(Debug)]
pub struct Query {
    pub kind: QueryKind,
    pub correlation: Option<CorrelationId>,
}

#[derive(Debug)]
pub enum QueryKind {
    Mid { symbol: String },
    Echo { value: u64 },
    Slow { delay: Duration, value: u64 },
    Silent,
}

impl Query {
    pub fn mid(symbol: &str) -> Self {
        Self::from(QueryKind::Mid {
            symbol: symbol.to_string(),
        })
    }

    pub fn echo(value: u64) -> Self {
        Self::from(QueryKind::Echo { value })
    }

    pub fn slow(delay: Duration, value: u64) -> Self {
        Self::from(QueryKind::Slow { delay, value })
    }

    pub fn silent() -> Self {
        Self::from(QueryKind::Silent)
    }
}

impl From<QueryKind> for Query {
    fn from(kind: QueryKind) -> Self {
        Self {
            kind,
            correlation: None,
        }
    }
}

impl Tagged for Query {
    type Tag = QueryTag;

    fn tag(&self) -> QueryTag {
        match self.kind {
            QueryKind::Mid { .. } => QueryTag::Mid,
            QueryKind::Echo { .. } => QueryTag::Echo,
            QueryKind::Slow { .. } => QueryTag::Slow,
            QueryKind::Silent => QueryTag::Silent,
        }
    }
}

impl Correlatable for Query {
    fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation
    }

    fn set_correlation_id(&mut self, id: CorrelationId) {
        self.correlation = Some(id);
    }
}

/// Install a test subscriber once (honours RUST_LOG)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `cond` until it holds, panicking after two seconds
pub fn wait_for(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(1));
    }
}
