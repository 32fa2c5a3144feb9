//! Market pipeline demonstration
//!
//! A synthetic quote feed drives a market-making strategy, which sends
//! orders to an executor. All three run under one supervisor.
//!
//! ```text
//! RUST_LOG=info cargo run --example market_pipeline [runtime.toml]
//! ```

use hyphae::prelude::*;
use hyphae::transport::{ActorFailure, FailureAction, MemoryPersister, MessageHandler};
use hyphae::{ActorError, Persistent, RingChannel};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

message_tag! {
    pub enum MarketTag {
        Quote => "market.quote",
    }
}

message_tag! {
    pub enum OrderTag {
        Place => "order.place",
        Inventory => "order.inventory",
    }
}

#[derive(Debug, Clone, Copy)]
struct Quote {
    bid: f64,
    ask: f64,
}

impl_tagged!(Quote, MarketTag, MarketTag::Quote);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Buy,
    Sell,
}

#[derive(Debug)]
enum Order {
    Place { side: Side, price: f64 },
    Inventory { correlation: Option<CorrelationId> },
}

impl Tagged for Order {
    type Tag = OrderTag;

    fn tag(&self) -> OrderTag {
        match self {
            Order::Place { .. } => OrderTag::Place,
            Order::Inventory { .. } => OrderTag::Inventory,
        }
    }
}

impl Correlatable for Order {
    fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Order::Inventory { correlation } => *correlation,
            Order::Place { .. } => None,
        }
    }

    fn set_correlation_id(&mut self, id: CorrelationId) {
        if let Order::Inventory { correlation } = self {
            *correlation = Some(id);
        }
    }
}

/// Leans against an exponentially smoothed mid: buys below it, sells above
struct MarketMaker {
    executor: ActorRef<Order>,
    fair: Option<f64>,
    quotes_seen: u64,
}

impl MessageHandler<Quote> for MarketMaker {
    fn handle(
        &mut self,
        quote: Quote,
        _ctx: &mut ActorContext<Quote>,
    ) -> Result<(), HandlerError> {
        let mid = (quote.bid + quote.ask) / 2.0;
        let fair = match self.fair {
            Some(fair) => fair * 0.9 + mid * 0.1,
            None => mid,
        };
        self.fair = Some(fair);
        self.quotes_seen += 1;

        let side = if mid < fair { Side::Buy } else { Side::Sell };
        self.executor
            .tell(Order::Place { side, price: mid })
            .map_err(|err| HandlerError::Failed(err.into()))
    }

    fn started(&mut self, ctx: &mut ActorContext<Quote>) {
        info!(actor_id = %ctx.actor_id(), "Market maker started");
    }

    fn stopped(&mut self, _ctx: &mut ActorContext<Quote>) {
        info!(quotes = self.quotes_seen, fair = ?self.fair, "Market maker stopped");
    }
}

fn load_config() -> anyhow::Result<RuntimeConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Loading runtime config");
            Ok(RuntimeConfig::load(path)?)
        }
        None => Ok(RuntimeConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config()?;
    let mut supervisor = Supervisor::new(config);

    // Executor: keeps a persistent net inventory
    let store = Arc::new(MemoryPersister::<i64>::new());
    let inventory = Persistent::new("inventory", 0i64, store);
    let executor = {
        let book = inventory.clone();
        let report = inventory.clone();
        supervisor
            .actor_builder::<Order>("executor", Stage::Execution)
            .persist(inventory.clone())
            .on(OrderTag::Place, move |order: Order, ctx| {
                if let Order::Place { side, price } = order {
                    let net = book.modify(ctx, |net| {
                        *net += if side == Side::Buy { 1 } else { -1 };
                        *net
                    });
                    tracing::debug!(?side, price, net, "Order filled");
                }
                Ok(())
            })
            .on(OrderTag::Inventory, move |order: Order, ctx| {
                ctx.reply_to(&order, report.get());
                Ok(())
            })
            .build()
    };
    let executor_ref = executor.actor_ref();

    let strategy = supervisor
        .actor_builder::<Quote>("market-maker", Stage::Strategy)
        .handler(MarketMaker {
            executor: executor_ref.clone(),
            fair: None,
            quotes_seen: 0,
        })
        .build();
    let strategy_ref = strategy.actor_ref();

    supervisor
        .add_strategy(strategy)
        .add_executor(executor)
        .on_failure(|failure: &ActorFailure| {
            warn!(%failure, "Stopping pipeline");
            FailureAction::StopAll
        });
    supervisor.start_all()?;

    // Feed gateway: decodes into a market data ring, a forwarder drains it
    let feed: Arc<RingChannel<Quote>> =
        Arc::new(RingChannel::new(&supervisor.config().stage(Stage::MarketData).channel));
    let forwarder = {
        let feed = Arc::clone(&feed);
        thread::spawn(move || {
            let mut shed = 0u64;
            while let Some(event) = feed.receive_blocking() {
                match strategy_ref.tell(event.into_payload()) {
                    Ok(()) => {}
                    // Stale quotes are worthless; shed them when the strategy lags
                    Err(ActorError::MailboxFull) => shed += 1,
                    Err(_) => break,
                }
            }
            shed
        })
    };

    let mut price = 100.0;
    for step in 0..10_000u32 {
        price += ((step % 17) as f64 - 8.0) * 0.01;
        feed.send_payload(Quote {
            bid: price - 0.05,
            ask: price + 0.05,
        });
    }
    feed.close();
    match forwarder.join() {
        Ok(shed) => info!(shed, "Feed drained"),
        Err(_) => warn!("Feed forwarder panicked"),
    }

    thread::sleep(Duration::from_millis(100));
    let net: i64 = executor_ref.ask(
        Order::Inventory { correlation: None },
        supervisor.config().default_ask_timeout(),
    )?;
    info!(net, feed = %feed.snapshot(), "Final inventory");

    for (name, status) in supervisor.status() {
        info!(actor = %name, %status, "Actor status");
    }
    supervisor.stop_all();
    Ok(())
}
