use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::errors::Error;
use crate::io::columnar::{quotes_to_batch, snapshots_to_batch};
use crate::io::parquet_file::{Codec, write_parquet};
use crate::scheduler::FetchOutcome;

pub const OPTIONS_FILE: &str = "options_data.parquet";
pub const STOCKS_FILE: &str = "stock_data.parquet";

#[async_trait]
pub trait DataSink {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink returns the paths it created; other sinks may report row
    /// counts instead.
    type Output;

    /// Persists the accumulated results of one scheduler run.
    async fn write(&self, outcome: &FetchOutcome) -> Result<Self::Output, Error>;
}

/// Files written for one fetch batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFiles {
    pub options: PathBuf,
    pub stocks: PathBuf,
}

/// Writes a batch as `<root>/batch-<id>/{options_data,stock_data}.parquet`.
#[derive(Debug, Clone)]
pub struct BatchDirSink {
    dir: PathBuf,
}

impl BatchDirSink {
    pub fn new(root: impl AsRef<Path>, batch_id: &str) -> Self {
        Self {
            dir: root.as_ref().join(format!("batch-{batch_id}")),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DataSink for BatchDirSink {
    type Output = BatchFiles;

    async fn write(&self, outcome: &FetchOutcome) -> Result<BatchFiles, Error> {
        let files = BatchFiles {
            options: self.dir.join(OPTIONS_FILE),
            stocks: self.dir.join(STOCKS_FILE),
        };

        let options = quotes_to_batch(&outcome.options)?;
        let stocks = snapshots_to_batch(&outcome.stocks)?;
        write_parquet(&files.options, &options, Codec::Snappy)?;
        write_parquet(&files.stocks, &stocks, Codec::Snappy)?;

        info!(
            options = %files.options.display(),
            stocks = %files.stocks.display(),
            contracts = options.num_rows(),
            symbols = stocks.num_rows(),
            "saved batch"
        );
        Ok(files)
    }
}
