use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::errors::Error;

/// Compression applied to a written file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    #[default]
    Snappy,
    Zstd,
}

impl Codec {
    fn compression(self) -> Compression {
        match self {
            Self::Snappy => Compression::SNAPPY,
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

/// Writes `batch` as a single parquet file, creating parent directories.
pub fn write_parquet(path: &Path, batch: &RecordBatch, codec: Codec) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
    }
    let file = File::create(path).map_err(|e| Error::file(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(codec.compression())
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

/// Reads a whole parquet file into one batch.
pub fn read_parquet(path: &Path) -> Result<RecordBatch, Error> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<Result<Vec<_>, arrow::error::ArrowError>>()?;
    concat_or_empty(&schema, &batches)
}

fn concat_or_empty(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch, Error> {
    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(schema.clone()));
    }
    Ok(concat_batches(schema, batches)?)
}

/// Every `*.parquet` file below `root`, sorted by path.
pub fn list_parquet_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut out = Vec::new();
    if root.is_dir() {
        collect(root, &mut out)?;
    }
    out.sort();
    Ok(out)
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), Error> {
    for entry in std::fs::read_dir(dir).map_err(|e| Error::file(dir, e))? {
        let path = entry.map_err(|e| Error::file(dir, e))?.path();
        if path.is_dir() {
            collect(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "parquet") {
            out.push(path);
        }
    }
    Ok(())
}
