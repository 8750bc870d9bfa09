//! Merges the per-batch outputs of a sharded fetch run and appends them to
//! the raw date partitions the store jobs consume:
//!
//! - option quotes to `<data>/w2/dt=<date>/<release>.parquet`
//! - stock snapshots to `<data>/ohlc/dt=<date>/<release>.parquet`
//!
//! The date is the UTC date of the snapshot timestamp. Existing partition
//! files are never replaced.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::errors::Error;
use crate::io::columnar::{batch_to_quotes, batch_to_snapshots, quotes_to_batch, snapshots_to_batch};
use crate::io::parquet_file::{Codec, read_parquet, write_parquet};
use crate::io::sink::{OPTIONS_FILE, STOCKS_FILE};
use crate::models::quote::{OptionQuote, StockSnapshot};

/// Raw option partitions below the data root.
pub const OPTIONS_PARTITION_ROOT: &str = "w2";
/// Raw stock snapshot partitions below the data root.
pub const OHLC_PARTITION_ROOT: &str = "ohlc";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Complete batches that were merged.
    pub batches: usize,
    pub option_rows: usize,
    pub stock_rows: usize,
    pub files: Vec<PathBuf>,
}

impl fmt::Display for FinalizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Merged {} batches: {} option rows, {} stock rows, {} files",
            self.batches,
            self.option_rows,
            self.stock_rows,
            self.files.len()
        )
    }
}

/// Turns a release label into a file stem (`2024-03-01 16:30` -> `2024-03-01_16_30`).
pub fn release_file_stem(release: &str) -> String {
    release
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Batch directories (`batch-*`) below `work_root`, sorted.
pub fn find_batch_dirs(work_root: &Path) -> Result<Vec<PathBuf>, Error> {
    if !work_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(work_root).map_err(|e| Error::file(work_root, e))? {
        let path = entry.map_err(|e| Error::file(work_root, e))?.path();
        let is_batch = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("batch-"));
        if is_batch && path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn finalize_batches(
    work_root: &Path,
    data_root: &Path,
    release: &str,
) -> Result<FinalizeReport, Error> {
    let batch_dirs = find_batch_dirs(work_root)?;
    if batch_dirs.is_empty() {
        return Err(Error::Sink(format!(
            "no batch outputs found under {}",
            work_root.display()
        )));
    }

    let mut quotes: Vec<OptionQuote> = Vec::new();
    let mut stocks: Vec<StockSnapshot> = Vec::new();
    let mut merged = 0;
    for dir in &batch_dirs {
        let options_path = dir.join(OPTIONS_FILE);
        let stocks_path = dir.join(STOCKS_FILE);
        if !options_path.exists() || !stocks_path.exists() {
            warn!(batch = %dir.display(), "incomplete batch output, skipping");
            continue;
        }
        quotes.extend(batch_to_quotes(&read_parquet(&options_path)?)?);
        stocks.extend(batch_to_snapshots(&read_parquet(&stocks_path)?)?);
        merged += 1;
    }
    if merged == 0 {
        return Err(Error::Sink(format!(
            "no complete batch outputs under {}",
            work_root.display()
        )));
    }

    let stem = release_file_stem(release);
    let mut report = FinalizeReport {
        batches: merged,
        option_rows: quotes.len(),
        stock_rows: stocks.len(),
        files: Vec::new(),
    };

    // Every target is checked before the first write so a refusal leaves
    // nothing behind.
    let option_files = group_by_date(quotes, OptionQuote::trade_date)
        .into_iter()
        .map(|(date, rows)| Ok((partition_file(data_root, OPTIONS_PARTITION_ROOT, date, &stem)?, rows)))
        .collect::<Result<Vec<_>, Error>>()?;
    let stock_files = group_by_date(stocks, StockSnapshot::trade_date)
        .into_iter()
        .map(|(date, rows)| Ok((partition_file(data_root, OHLC_PARTITION_ROOT, date, &stem)?, rows)))
        .collect::<Result<Vec<_>, Error>>()?;

    for (path, rows) in option_files {
        write_parquet(&path, &quotes_to_batch(&rows)?, Codec::Snappy)?;
        report.files.push(path);
    }
    for (path, rows) in stock_files {
        write_parquet(&path, &snapshots_to_batch(&rows)?, Codec::Snappy)?;
        report.files.push(path);
    }

    info!(%report, "finalized fetch batches");
    Ok(report)
}

fn group_by_date<T>(rows: Vec<T>, date: fn(&T) -> NaiveDate) -> BTreeMap<NaiveDate, Vec<T>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<T>> = BTreeMap::new();
    for row in rows {
        grouped.entry(date(&row)).or_default().push(row);
    }
    grouped
}

fn partition_file(root: &Path, table: &str, date: NaiveDate, stem: &str) -> Result<PathBuf, Error> {
    let path = root
        .join(table)
        .join(format!("dt={date}"))
        .join(format!("{stem}.parquet"));
    if path.exists() {
        return Err(Error::Sink(format!(
            "refusing to overwrite existing partition file {}",
            path.display()
        )));
    }
    Ok(path)
}
