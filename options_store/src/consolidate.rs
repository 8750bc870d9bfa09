//! Incremental consolidation of raw option partitions into the canonical,
//! symbol-partitioned store.
//!
//! One run:
//! 1. loads the committed checkpoint from the source root;
//! 2. picks at most `max_dates` raw `dt=` partitions newer than it;
//! 3. for each date, oldest first, canonicalizes every row (dated by the
//!    partition) and appends one new file per underlying under
//!    `w2-output/symbol=<SYM>/`;
//! 4. mirrors the files written by this run into `w2-flat/` as `<SYM>_<file>`;
//! 5. commits the advanced checkpoint to the working root.
//!
//! A date is canonicalized completely before any of its files is written, so
//! a malformed contract code aborts the run without a half-written date.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use options_ingestor::io::columnar::batch_to_quotes;
use options_ingestor::io::parquet_file::{Codec, list_parquet_files, read_parquet, write_parquet};
use options_ingestor::models::exception_symbols::ExceptionSymbolSet;
use tracing::info;
use uuid::Uuid;

use crate::canonical::canonicalize_quote;
use crate::checkpoint::CheckpointTracker;
use crate::error::{StoreError, StoreResult};
use crate::records::{CanonicalOptionRecord, canonical_to_batch};
use crate::scanner::{DatePartition, scan_partitions};

/// Raw option partitions below the source root.
pub const RAW_OPTIONS_DIR: &str = "w2";
/// Symbol-partitioned output below the working root.
pub const OUTPUT_DIR: &str = "w2-output";
/// Flat mirror below the working root.
pub const FLAT_DIR: &str = "w2-flat";

/// Inputs of one consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidationWriter {
    source_dir: PathBuf,
    work_dir: PathBuf,
    max_dates: usize,
    exceptions: ExceptionSymbolSet,
}

/// What a consolidation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Dates consolidated, ascending.
    pub dates: Vec<String>,
    /// Canonical rows appended.
    pub rows_written: usize,
    /// Files appended under the symbol partitions.
    pub files_written: Vec<PathBuf>,
    /// Files of this run copied into the flat mirror.
    pub mirrored: usize,
    /// Checkpoint value committed at the end of the run.
    pub checkpoint: String,
}

impl fmt::Display for ConsolidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dates.is_empty() {
            return write!(f, "No new dates to consolidate (checkpoint {})", self.checkpoint);
        }
        write!(
            f,
            "Consolidated {} dates ({}..={}): {} rows in {} files, {} mirrored, checkpoint {}",
            self.dates.len(),
            self.dates[0],
            self.dates[self.dates.len() - 1],
            self.rows_written,
            self.files_written.len(),
            self.mirrored,
            self.checkpoint
        )
    }
}

impl ConsolidationWriter {
    /// `source_dir` holds `w2/` and the committed `config.json`; everything is
    /// written below `work_dir`.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        max_dates: usize,
        exceptions: ExceptionSymbolSet,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            work_dir: work_dir.into(),
            max_dates,
            exceptions,
        }
    }

    /// Symbol-partitioned output root.
    pub fn output_dir(&self) -> PathBuf {
        self.work_dir.join(OUTPUT_DIR)
    }

    /// Flat mirror root.
    pub fn flat_dir(&self) -> PathBuf {
        self.work_dir.join(FLAT_DIR)
    }

    /// Runs one bounded consolidation batch.
    pub fn run(&self) -> StoreResult<ConsolidationReport> {
        let mut tracker = CheckpointTracker::load(&self.source_dir)?;
        let partitions = scan_partitions(
            &self.source_dir.join(RAW_OPTIONS_DIR),
            tracker.current(),
            self.max_dates,
        )?;

        let mut report = ConsolidationReport::default();
        for partition in &partitions {
            let (rows, files) = self.consolidate_date(partition)?;
            tracker.advance(&partition.date);
            report.dates.push(partition.date.clone());
            report.rows_written += rows;
            report.files_written.extend(files);
        }

        report.mirrored = mirror_flat(&report.files_written, &self.flat_dir())?;
        tracker.commit(&self.work_dir)?;
        report.checkpoint = tracker.current().last_date.clone();

        info!(%report, "consolidation finished");
        Ok(report)
    }

    fn consolidate_date(&self, partition: &DatePartition) -> StoreResult<(usize, Vec<PathBuf>)> {
        let mut by_symbol: BTreeMap<String, Vec<CanonicalOptionRecord>> = BTreeMap::new();
        for file in list_parquet_files(&partition.path)? {
            for quote in batch_to_quotes(&read_parquet(&file)?)? {
                let record = canonicalize_quote(&quote, partition.day, &self.exceptions)?;
                by_symbol
                    .entry(record.underlying_symbol.clone())
                    .or_default()
                    .push(record);
            }
        }

        let mut rows = 0;
        let mut files = Vec::with_capacity(by_symbol.len());
        for (symbol, records) in by_symbol {
            let path = self
                .output_dir()
                .join(format!("symbol={symbol}"))
                .join(format!("data_{}_{}.parquet", partition.date, Uuid::new_v4()));
            write_parquet(&path, &canonical_to_batch(&records)?, Codec::Snappy)?;
            rows += records.len();
            files.push(path);
        }

        info!(date = %partition.date, rows, files = files.len(), "consolidated date");
        Ok((rows, files))
    }
}

/// Copies each `symbol=<SYM>/<file>` in `files` to `flat/<SYM>_<file>`.
pub fn mirror_flat(files: &[PathBuf], flat: &Path) -> StoreResult<usize> {
    let mut copied = 0;
    for file in files {
        let Some(symbol) = file
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("symbol="))
        else {
            continue;
        };
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        std::fs::create_dir_all(flat).map_err(|e| StoreError::file(flat, e))?;
        let target = flat.join(format!("{symbol}_{name}"));
        std::fs::copy(file, &target).map_err(|e| StoreError::file(&target, e))?;
        copied += 1;
    }
    Ok(copied)
}
