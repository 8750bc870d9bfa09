#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use options_ingestor::models::quote::{ChainSnapshot, OptionQuote, StockSnapshot};
use options_ingestor::providers::{FeedError, OptionsFeed};
use tokio::time::Instant;

/// What the scripted feed answers for one call.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Fresh,
    Stale,
    Status(u16, Option<u64>),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub symbol: String,
    pub exception: bool,
    pub at: Instant,
}

/// An `OptionsFeed` that replays per-symbol scripts. Exhausted scripts
/// answer `Fresh`.
#[derive(Default)]
pub struct ScriptedFeed {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    latency: HashMap<String, Duration>,
    calls: Mutex<Vec<Call>>,
    refreshes: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, symbol: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(symbol.to_string(), steps.into_iter().collect());
        self
    }

    pub fn latency(mut self, symbol: &str, d: Duration) -> Self {
        self.latency.insert(symbol.to_string(), d);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, symbol: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.symbol == symbol).collect()
    }

    pub fn refreshes(&self) -> Vec<String> {
        self.refreshes.lock().unwrap().clone()
    }
}

#[async_trait]
impl OptionsFeed for ScriptedFeed {
    async fn fetch_chain(&self, symbol: &str, exception: bool) -> Result<ChainSnapshot, FeedError> {
        self.calls.lock().unwrap().push(Call {
            symbol: symbol.to_string(),
            exception,
            at: Instant::now(),
        });
        if let Some(d) = self.latency.get(symbol) {
            tokio::time::sleep(*d).await;
        }

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Fresh);

        match step {
            Step::Fresh => Ok(snapshot(symbol, TimeDelta::minutes(1))),
            Step::Stale => Ok(snapshot(symbol, TimeDelta::hours(3))),
            Step::Status(code, retry_after) => Err(FeedError::http(
                code,
                retry_after,
                format!("mock://{symbol}.json"),
            )),
        }
    }

    async fn request_refresh(&self, symbol: &str, _exception: bool) -> Result<(), FeedError> {
        self.refreshes.lock().unwrap().push(symbol.to_string());
        Err(FeedError::http(403, None, format!("mock://refresh/{symbol}")))
    }
}

/// A one-contract snapshot `age` old.
pub fn snapshot(symbol: &str, age: TimeDelta) -> ChainSnapshot {
    let timestamp = Utc::now() - age;
    ChainSnapshot {
        timestamp,
        stock: StockSnapshot {
            timestamp,
            symbol: symbol.to_string(),
            current_price: Some(100.0),
            open: Some(99.0),
            high: Some(101.0),
            low: Some(98.5),
            close: Some(100.0),
            prev_day_close: Some(99.5),
            volume: Some(1_000.0),
            price_change: Some(0.5),
            price_change_percent: Some(0.5),
            iv30: Some(20.0),
        },
        options: vec![OptionQuote {
            timestamp,
            symbol: symbol.to_string(),
            option: format!("{symbol}240621C00100000"),
            open_interest: 10,
            volume: 2,
            delta: Some(0.5),
            gamma: Some(0.01),
            vega: Some(0.2),
            theta: Some(-0.05),
            rho: Some(0.03),
            theo: Some(4.2),
            open: None,
            high: None,
            iv: Some(0.25),
            bid: Some(4.1),
            ask: Some(4.3),
        }],
    }
}
