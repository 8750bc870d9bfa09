use std::path::PathBuf;

use arrow::datatypes::DataType;
use thiserror::Error;

use crate::providers::FeedError;

/// The unified error type for the `options_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from the upstream feed.
    #[error("Provider error: {0}")]
    Provider(#[from] FeedError),

    /// An error originating from a data sink (e.g., file I/O, missing inputs).
    #[error("Sink error: {0}")]
    Sink(String),

    /// An error related to configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file could not be read or written.
    #[error("I/O error at {}: {source}", path.display())]
    File {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error from the Parquet library.
    #[error("Parquet operation failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A JSON document could not be decoded.
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A required column is absent from a record batch.
    #[error("column `{0}` is missing")]
    MissingColumn(String),

    /// A column exists but holds an unexpected Arrow type.
    #[error("column `{column}` has type {found}, expected {expected}")]
    ColumnType {
        /// Column name.
        column: String,
        /// Type found in the batch.
        found: DataType,
        /// Rust array type that was requested.
        expected: &'static str,
    },

    /// A cell holds a value that cannot be represented.
    #[error("invalid value in column `{column}` at row {row}: {message}")]
    InvalidValue {
        /// Column name.
        column: String,
        /// Row index inside the batch.
        row: usize,
        /// What was wrong.
        message: String,
    },
}

impl Error {
    /// Wraps an I/O error with the path it happened on.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}
