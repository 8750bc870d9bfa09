//! Error type shared by every store job.
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
/// Errors raised while consolidating, merging or scoring option data.
pub enum StoreError {
    #[error("malformed contract code `{code}`: {reason}")]
    /// A raw contract code does not follow `<ticker><YYMMDD><C|P><strike*1000>`.
    MalformedContractCode {
        /// The offending code.
        code: String,
        /// What did not match.
        reason: &'static str,
    },

    #[error("source directory {} does not exist", path.display())]
    /// The raw partition root is missing.
    SourceDirectoryMissing {
        /// Expected directory.
        path: PathBuf,
    },

    #[error("invalid checkpoint date `{value}` in {}", path.display())]
    /// The checkpoint file holds something other than `YYYY-MM-DD`.
    InvalidCheckpoint {
        /// Checkpoint file.
        path: PathBuf,
        /// Stored value.
        value: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    /// A file or directory could not be read or written.
    File {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    /// A JSON document could not be encoded or decoded.
    Json {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    #[error(transparent)]
    /// Columnar I/O failure from the shared parquet helpers.
    Ingest(#[from] options_ingestor::Error),

    #[error("Arrow operation failed: {0}")]
    /// An Arrow kernel or batch construction failed.
    Arrow(#[from] arrow::error::ArrowError),
}

impl StoreError {
    /// Wraps an I/O error with the path it happened on.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
