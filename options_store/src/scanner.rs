//! Discovery of raw date partitions newer than the checkpoint.
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::checkpoint::Checkpoint;
use crate::error::{StoreError, StoreResult};

/// Directory name prefix of a date partition.
pub const PARTITION_PREFIX: &str = "dt=";

/// One `dt=YYYY-MM-DD` directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatePartition {
    /// The partition date as written in the directory name.
    pub date: String,
    /// The same date, parsed.
    pub day: NaiveDate,
    /// Directory path.
    pub path: PathBuf,
}

/// Parses a directory name of the form `dt=YYYY-MM-DD`.
pub fn partition_date(name: &str) -> Option<(&str, NaiveDate)> {
    let date = name.strip_prefix(PARTITION_PREFIX)?;
    if date.len() != 10 {
        return None;
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((date, day))
}

/// Lists partitions under `root` strictly newer than `checkpoint`, oldest
/// first, at most `limit` of them.
pub fn scan_partitions(
    root: &Path,
    checkpoint: &Checkpoint,
    limit: usize,
) -> StoreResult<Vec<DatePartition>> {
    if !root.is_dir() {
        return Err(StoreError::SourceDirectoryMissing {
            path: root.to_path_buf(),
        });
    }

    let mut eligible = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| StoreError::file(root, e))? {
        let path = entry.map_err(|e| StoreError::file(root, e))?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let Some((date, day)) = partition_date(name).filter(|_| path.is_dir()) else {
            debug!(path = %path.display(), "not a date partition, skipping");
            continue;
        };
        // Lexicographic order of YYYY-MM-DD is date order.
        if date > checkpoint.last_date.as_str() {
            eligible.push(DatePartition {
                date: date.to_string(),
                day,
                path: path.clone(),
            });
        }
    }

    eligible.sort();
    let total = eligible.len();
    eligible.truncate(limit);
    info!(
        after = %checkpoint.last_date,
        found = total,
        selected = eligible.len(),
        "scanned date partitions"
    );
    Ok(eligible)
}
