//! End-to-end pipeline: feed -> strategy -> executor under one supervisor

use hyphae::prelude::*;
use hyphae::transport::MemoryPersister;
use hyphae::{ActorStatus, Persistent};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

message_tag! {
    pub enum FeedTag {
        Replay => "feed.replay",
    }
}

message_tag! {
    pub enum QuoteTag {
        Quote => "market.quote",
    }
}

message_tag! {
    pub enum OrderTag {
        Submit => "order.submit",
        Position => "order.position",
    }
}

#[derive(Debug, Clone, Copy)]
struct Quote {
    bid: f64,
    ask: f64,
}

impl_tagged!(Quote, QuoteTag, QuoteTag::Quote);

#[derive(Debug)]
struct Replay(Vec<Quote>);

impl_tagged!(Replay, FeedTag, FeedTag::Replay);

#[derive(Debug)]
enum Order {
    Submit { qty: i64 },
    Position { correlation: Option<CorrelationId> },
}

impl Tagged for Order {
    type Tag = OrderTag;

    fn tag(&self) -> OrderTag {
        match self {
            Order::Submit { .. } => OrderTag::Submit,
            Order::Position { .. } => OrderTag::Position,
        }
    }
}

impl Correlatable for Order {
    fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Order::Position { correlation } => *correlation,
            Order::Submit { .. } => None,
        }
    }

    fn set_correlation_id(&mut self, id: CorrelationId) {
        if let Order::Position { correlation } = self {
            *correlation = Some(id);
        }
    }
}

struct Pipeline {
    supervisor: Supervisor,
    feed: ActorRef<Replay>,
    executor: ActorRef<Order>,
    position: Persistent<i64>,
}

/// Buys one lot whenever the spread is tighter than 1.0
fn build_pipeline(config: RuntimeConfig) -> Pipeline {
    let mut supervisor = Supervisor::new(config);
    let store = Arc::new(MemoryPersister::<i64>::new());
    let position = Persistent::new("position", 0i64, store);

    let executor = {
        let book = position.clone();
        let report = position.clone();
        supervisor
            .actor_builder::<Order>("executor", Stage::Execution)
            .persist(position.clone())
            .on(OrderTag::Submit, move |order: Order, ctx| {
                if let Order::Submit { qty } = order {
                    book.modify(ctx, |pos| *pos += qty);
                }
                Ok(())
            })
            .on(OrderTag::Position, move |order: Order, ctx| {
                ctx.reply_to(&order, report.get());
                Ok(())
            })
            .build()
    };
    let executor_ref = executor.actor_ref();

    let strategy = {
        let executor = executor_ref.clone();
        supervisor
            .actor_builder::<Quote>("spread-taker", Stage::Strategy)
            .handle_with(move |quote: Quote, _| {
                if quote.ask - quote.bid < 1.0 {
                    executor.tell(Order::Submit { qty: 1 })?;
                }
                Ok(())
            })
            .build()
    };
    let strategy_ref = strategy.actor_ref();

    let feed = supervisor
        .actor_builder::<Replay>("replay-feed", Stage::MarketData)
        .handle_with(move |Replay(quotes), _| {
            for quote in quotes {
                strategy_ref.tell(quote)?;
            }
            Ok(())
        })
        .build();
    let feed_ref = feed.actor_ref();

    supervisor
        .add_source(feed)
        .add_strategy(strategy)
        .add_executor(executor);

    Pipeline {
        supervisor,
        feed: feed_ref,
        executor: executor_ref,
        position,
    }
}

fn quotes(count: usize) -> Vec<Quote> {
    (0..count)
        .map(|i| {
            let bid = 100.0 + i as f64;
            // Every other quote has a tight spread
            let spread = if i % 2 == 0 { 0.5 } else { 2.0 };
            Quote {
                bid,
                ask: bid + spread,
            }
        })
        .collect()
}

fn position_of(pipeline: &Pipeline) -> i64 {
    pipeline
        .executor
        .ask(Order::Position { correlation: None }, Duration::from_secs(1))
        .unwrap()
}

fn wait_for_position(pipeline: &Pipeline, expected: i64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while position_of(pipeline) != expected {
        assert!(Instant::now() < deadline, "position never reached {expected}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_quotes_flow_to_executor() {
    let pipeline = build_pipeline(RuntimeConfig::default());
    pipeline.supervisor.start_all().unwrap();

    pipeline.feed.tell(Replay(quotes(200))).unwrap();
    wait_for_position(&pipeline, 100);

    assert_eq!(pipeline.position.get(), 100);
    let metrics = pipeline.executor.metrics();
    assert!(metrics.processed() >= 100);
    assert_eq!(metrics.failures(), 0);

    pipeline.supervisor.stop_all();
    assert!(pipeline
        .supervisor
        .status()
        .iter()
        .all(|(_, status)| *status == ActorStatus::Stopped));
}

#[test]
fn test_several_replays_accumulate() {
    let pipeline = build_pipeline(RuntimeConfig::default());
    pipeline.supervisor.start_all().unwrap();

    for _ in 0..5 {
        pipeline.feed.tell(Replay(quotes(10))).unwrap();
    }
    wait_for_position(&pipeline, 25);

    pipeline.supervisor.stop_all();
    assert!(matches!(
        pipeline.feed.tell(Replay(Vec::new())),
        Err(hyphae::ActorError::NotRunning)
    ));
}

#[test]
fn test_pipeline_from_toml_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
default_ask_timeout_ms = 500

[strategy.channel]
kind = "blocking"

[execution.channel]
kind = "ring"
capacity = 512
full_policy = "discard_newest"
"#
    )
    .unwrap();

    let config = RuntimeConfig::load(file.path()).unwrap();
    assert_eq!(config.default_ask_timeout(), Duration::from_millis(500));
    assert_eq!(config.stage(Stage::Execution).channel.capacity, 512);

    let pipeline = build_pipeline(config);
    pipeline.supervisor.start_all().unwrap();
    pipeline.feed.tell(Replay(quotes(300))).unwrap();
    wait_for_position(&pipeline, 150);
    pipeline.supervisor.stop_all();
}

#[test]
fn test_tags_are_stable() {
    assert_eq!(QuoteTag::Quote.as_str(), "market.quote");
    assert_eq!(OrderTag::Position.to_string(), "order.position");
}
