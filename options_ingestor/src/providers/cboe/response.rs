use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::models::quote::{ChainSnapshot, OptionQuote, StockSnapshot};
use crate::providers::FeedError;

/// Timestamp layout of the chain document (UTC, no offset).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize, Debug)]
pub struct CboeOption {
    pub option: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub iv: Option<f64>,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub rho: Option<f64>,
    pub vega: Option<f64>,
    pub theo: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct CboeChainData {
    #[serde(default)]
    pub options: Vec<CboeOption>,
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
    pub price_change_percent: Option<f64>,
    pub iv30: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub prev_day_close: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct CboeChainResponse {
    pub timestamp: String,
    pub symbol: String,
    pub data: CboeChainData,
}

impl CboeChainResponse {
    /// Parses the document timestamp as UTC.
    pub fn snapshot_time(&self) -> Result<DateTime<Utc>, FeedError> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                FeedError::payload(format!("bad timestamp `{}`: {e}", self.timestamp))
            })
    }

    /// Splits the document into the underlying snapshot and its contracts.
    pub fn into_snapshot(self) -> Result<ChainSnapshot, FeedError> {
        let timestamp = self.snapshot_time()?;
        let symbol = self.symbol;
        let data = self.data;

        let options = data
            .options
            .into_iter()
            .map(|o| OptionQuote {
                timestamp,
                symbol: symbol.clone(),
                option: o.option,
                open_interest: count(o.open_interest),
                volume: count(o.volume),
                delta: o.delta,
                gamma: o.gamma,
                vega: o.vega,
                theta: o.theta,
                rho: o.rho,
                theo: o.theo,
                open: o.open,
                high: o.high,
                iv: o.iv,
                bid: o.bid,
                ask: o.ask,
            })
            .collect();

        let stock = StockSnapshot {
            timestamp,
            symbol,
            current_price: data.current_price,
            open: data.open,
            high: data.high,
            low: data.low,
            close: data.close,
            prev_day_close: data.prev_day_close,
            volume: data.volume,
            price_change: data.price_change,
            price_change_percent: data.price_change_percent,
            iv30: data.iv30,
        };

        Ok(ChainSnapshot {
            timestamp,
            stock,
            options,
        })
    }
}

// The feed reports counts as floats ("volume": 12.0).
fn count(v: Option<f64>) -> i64 {
    v.filter(|x| x.is_finite() && *x > 0.0)
        .map(|x| x.round() as i64)
        .unwrap_or(0)
}
