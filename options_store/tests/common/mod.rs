#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeZone, Utc};
use options_ingestor::io::columnar::{quotes_to_batch, snapshots_to_batch};
use options_ingestor::io::parquet_file::{Codec, write_parquet};
use options_ingestor::models::quote::{OptionQuote, StockSnapshot};
use tempfile::TempDir;

/// A source root and a work root inside one temp directory.
pub struct Roots {
    _dir: TempDir, // keep alive for the life of the test
    pub data: PathBuf,
    pub work: PathBuf,
}

pub fn roots() -> Roots {
    let dir = TempDir::new().expect("tempdir");
    let data = dir.path().join("data");
    let work = dir.path().join("work");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::create_dir_all(&work).unwrap();
    Roots {
        _dir: dir,
        data,
        work,
    }
}

pub fn day(d: &str) -> NaiveDate {
    NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
}

/// A quote taken at 20:00 UTC on `date`.
pub fn quote(date: &str, symbol: &str, code: &str, oi: i64) -> OptionQuote {
    let ts = Utc.from_utc_datetime(&day(date).and_hms_opt(20, 0, 0).unwrap());
    OptionQuote {
        timestamp: ts,
        symbol: symbol.into(),
        option: code.into(),
        open_interest: oi,
        volume: 3,
        delta: Some(0.5),
        gamma: None,
        vega: None,
        theta: None,
        rho: None,
        theo: None,
        open: None,
        high: None,
        iv: Some(0.25),
        bid: Some(1.0),
        ask: Some(1.1),
    }
}

pub fn stock(date: &str, symbol: &str, close: f64) -> StockSnapshot {
    let ts = Utc.from_utc_datetime(&day(date).and_hms_opt(20, 0, 0).unwrap());
    StockSnapshot {
        timestamp: ts,
        symbol: symbol.into(),
        current_price: Some(close),
        open: Some(close - 1.0),
        high: Some(close + 1.0),
        low: Some(close - 2.0),
        close: Some(close),
        prev_day_close: Some(close - 0.5),
        volume: Some(1_000.0),
        price_change: Some(0.5),
        price_change_percent: None,
        iv30: None,
    }
}

/// Writes `<root>/dt=<date>/<file>.parquet` with the given quotes.
pub fn write_raw_options(root: &Path, date: &str, file: &str, quotes: &[OptionQuote]) -> PathBuf {
    let path = root.join(format!("dt={date}")).join(format!("{file}.parquet"));
    write_parquet(&path, &quotes_to_batch(quotes).unwrap(), Codec::Snappy).unwrap();
    path
}

/// Writes `<root>/dt=<date>/<file>.parquet` with the given snapshots.
pub fn write_raw_stocks(root: &Path, date: &str, file: &str, stocks: &[StockSnapshot]) -> PathBuf {
    let path = root.join(format!("dt={date}")).join(format!("{file}.parquet"));
    write_parquet(&path, &snapshots_to_batch(stocks).unwrap(), Codec::Snappy).unwrap();
    path
}

/// File names directly inside `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
