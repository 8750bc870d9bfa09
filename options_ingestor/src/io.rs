//! Columnar persistence of fetch results: Arrow schemas, parquet helpers,
//! the per-batch sink and the finalize step that turns batch outputs into
//! date-partitioned raw files.

pub mod columnar;
pub mod finalize;
pub mod parquet_file;
pub mod sink;
pub mod symbols;
