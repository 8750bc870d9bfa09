//! Consolidation checkpoint: the last raw date partition already merged into
//! the canonical store, persisted as `config.json`:
//!
//! ```json
//! { "lastDate": "2024-03-01" }
//! ```
//!
//! The committed copy is read from the source root and the advanced copy is
//! written to the working root, from where the release step publishes it.
//! The value only ever moves forward.
//!
//! Writing the checkpoint is not atomic with writing the partitions it
//! covers. A run that dies in between replays those dates next time and
//! duplicates their rows.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// File name of the checkpoint in both the source and working roots.
pub const CHECKPOINT_FILE: &str = "config.json";

/// Checkpoint assumed when none was ever committed.
pub const DEFAULT_CHECKPOINT_DATE: &str = "2024-01-01";

/// On-disk checkpoint document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last consolidated date, `YYYY-MM-DD`.
    #[serde(rename = "lastDate")]
    pub last_date: String,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            last_date: DEFAULT_CHECKPOINT_DATE.to_string(),
        }
    }
}

impl Checkpoint {
    /// The checkpoint as a calendar date.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.last_date, "%Y-%m-%d").ok()
    }
}

/// In-memory checkpoint for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTracker {
    current: Checkpoint,
    loaded_from: Option<PathBuf>,
}

impl CheckpointTracker {
    /// Starts from an explicit checkpoint.
    pub fn new(current: Checkpoint) -> Self {
        Self {
            current,
            loaded_from: None,
        }
    }

    /// Reads `<source_dir>/config.json`, falling back to the default sentinel
    /// when the file does not exist.
    pub fn load(source_dir: &Path) -> StoreResult<Self> {
        let path = source_dir.join(CHECKPOINT_FILE);
        if !path.exists() {
            info!(
                path = %path.display(),
                default = DEFAULT_CHECKPOINT_DATE,
                "no checkpoint found, starting from default"
            );
            return Ok(Self::new(Checkpoint::default()));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| StoreError::file(&path, e))?;
        let current: Checkpoint = serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        if current.date().is_none() {
            return Err(StoreError::InvalidCheckpoint {
                path,
                value: current.last_date,
            });
        }

        info!(last_date = %current.last_date, "loaded checkpoint");
        Ok(Self {
            current,
            loaded_from: Some(path),
        })
    }

    /// Current value.
    pub fn current(&self) -> &Checkpoint {
        &self.current
    }

    /// Where the value was loaded from, if a file existed.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    /// Moves the checkpoint to `date` unless it is already at or past it.
    /// Returns whether the value changed.
    pub fn advance(&mut self, date: &str) -> bool {
        if date > self.current.last_date.as_str() {
            debug!(from = %self.current.last_date, to = date, "advancing checkpoint");
            self.current.last_date = date.to_string();
            true
        } else {
            false
        }
    }

    /// Persists the current value to `<work_dir>/config.json`.
    pub fn commit(&self, work_dir: &Path) -> StoreResult<PathBuf> {
        std::fs::create_dir_all(work_dir).map_err(|e| StoreError::file(work_dir, e))?;
        let path = work_dir.join(CHECKPOINT_FILE);
        let json = serde_json::to_string_pretty(&self.current).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|e| StoreError::file(&path, e))?;
        info!(path = %path.display(), last_date = %self.current.last_date, "committed checkpoint");
        Ok(path)
    }
}
