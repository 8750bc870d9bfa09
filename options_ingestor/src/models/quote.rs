//! Canonical in-memory representation of one upstream snapshot.
//!
//! A successful chain fetch yields one [`StockSnapshot`] for the underlying and
//! one [`OptionQuote`] per listed contract. Both are vendor-agnostic and are
//! what the raw parquet sinks persist.

use chrono::{DateTime, NaiveDate, Utc};

/// Quote of the underlying at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    /// Upstream snapshot timestamp (UTC).
    pub timestamp: DateTime<Utc>,

    /// Symbol as reported upstream; exception symbols keep their marker (e.g. `_SPX`).
    pub symbol: String,

    /// Last traded price.
    pub current_price: Option<f64>,

    /// Session open.
    pub open: Option<f64>,

    /// Session high.
    pub high: Option<f64>,

    /// Session low.
    pub low: Option<f64>,

    /// Session close.
    pub close: Option<f64>,

    /// Previous session close.
    pub prev_day_close: Option<f64>,

    /// Shares traded.
    pub volume: Option<f64>,

    /// Absolute change against the previous close.
    pub price_change: Option<f64>,

    /// Percentage change against the previous close.
    pub price_change_percent: Option<f64>,

    /// 30-day implied volatility index.
    pub iv30: Option<f64>,
}

impl StockSnapshot {
    /// Trading date the snapshot belongs to.
    pub fn trade_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// One option contract row of a chain snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionQuote {
    /// Upstream snapshot timestamp (UTC).
    pub timestamp: DateTime<Utc>,

    /// Underlying symbol as reported upstream, marker included.
    pub symbol: String,

    /// Raw contract code, e.g. `AAPL240621C00150000`.
    pub option: String,

    /// Open interest in contracts.
    pub open_interest: i64,

    /// Contracts traded in the session.
    pub volume: i64,

    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub vega: Option<f64>,
    pub theta: Option<f64>,
    pub rho: Option<f64>,

    /// Theoretical value.
    pub theo: Option<f64>,

    pub open: Option<f64>,
    pub high: Option<f64>,

    /// Implied volatility.
    pub iv: Option<f64>,

    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl OptionQuote {
    /// Trading date the quote belongs to.
    pub fn trade_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Everything one successful chain fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSnapshot {
    /// Upstream snapshot timestamp, used for the staleness check.
    pub timestamp: DateTime<Utc>,
    pub stock: StockSnapshot,
    pub options: Vec<OptionQuote>,
}

impl ChainSnapshot {
    /// Age of the snapshot relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::TimeDelta {
        now - self.timestamp
    }
}
