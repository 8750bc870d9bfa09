//! Deduplicating merge of raw underlying snapshots into the canonical OHLC
//! store.
//!
//! The canonical store is the union of every artifact a previous merge wrote.
//! A run computes `raw EXCEPT canonical` over whole records and writes only
//! that delta, so re-running over the same raw files adds nothing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use options_ingestor::io::columnar::batch_to_snapshots;
use options_ingestor::io::parquet_file::{Codec, list_parquet_files, read_parquet, write_parquet};
use options_ingestor::models::exception_symbols::strip_marker;
use options_ingestor::models::quote::StockSnapshot;
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::records::{OhlcRecord, batch_to_ohlc, ohlc_to_batch};

/// Result of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhlcMergeOutcome {
    /// Rows not yet present in the canonical store.
    pub delta_rows: usize,
    /// File holding the delta, absent when there was nothing new.
    pub artifact: Option<PathBuf>,
}

impl From<&StockSnapshot> for OhlcRecord {
    fn from(s: &StockSnapshot) -> Self {
        Self {
            date: s.trade_date(),
            symbol: strip_marker(&s.symbol).to_string(),
            open: s.open,
            high: s.high,
            low: s.low,
            close: s.close,
            prev_close: s.prev_day_close,
            volume: s.volume,
        }
    }
}

/// Every raw snapshot under `raw_root` as OHLC records, duplicates collapsed,
/// first-seen order kept.
pub fn load_raw(raw_root: &Path) -> StoreResult<IndexSet<OhlcRecord>> {
    if !raw_root.is_dir() {
        return Err(StoreError::SourceDirectoryMissing {
            path: raw_root.to_path_buf(),
        });
    }
    let mut rows = IndexSet::new();
    for file in list_parquet_files(raw_root)? {
        let snapshots = batch_to_snapshots(&read_parquet(&file)?)?;
        rows.extend(snapshots.iter().map(OhlcRecord::from));
    }
    Ok(rows)
}

/// Every record already in the canonical store. A store that does not exist
/// yet is empty.
pub fn load_canonical(canonical_root: &Path) -> StoreResult<HashSet<OhlcRecord>> {
    let mut rows = HashSet::new();
    for file in list_parquet_files(canonical_root)? {
        rows.extend(batch_to_ohlc(&read_parquet(&file)?)?);
    }
    Ok(rows)
}

/// Writes `raw EXCEPT canonical` to `<out_dir>/<label>/ohlc_<uuid>.parquet`.
///
/// An empty delta writes nothing and leaves `out_dir` untouched, so `out_dir`
/// may be the canonical store itself and reruns under the same label are
/// safe.
pub fn merge_ohlc(
    raw_root: &Path,
    canonical_root: &Path,
    out_dir: &Path,
    label: &str,
) -> StoreResult<OhlcMergeOutcome> {
    let raw = load_raw(raw_root)?;
    let canonical = load_canonical(canonical_root)?;
    let delta: Vec<OhlcRecord> = raw
        .into_iter()
        .filter(|r| !canonical.contains(r))
        .collect();

    if delta.is_empty() {
        info!(canonical = canonical.len(), "no new OHLC rows");
        return Ok(OhlcMergeOutcome {
            delta_rows: 0,
            artifact: None,
        });
    }

    let run_dir = out_dir.join(label);
    let path = run_dir.join(format!("ohlc_{}.parquet", Uuid::new_v4()));
    write_parquet(&path, &ohlc_to_batch(&delta)?, Codec::Snappy)?;
    info!(
        delta = delta.len(),
        canonical = canonical.len(),
        path = %path.display(),
        "wrote OHLC delta"
    );
    Ok(OhlcMergeOutcome {
        delta_rows: delta.len(),
        artifact: Some(path),
    })
}
