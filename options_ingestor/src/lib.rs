//! Options chain ingestion: the upstream feed abstraction, the resilient
//! per-symbol fetch scheduler and the raw parquet sinks.

pub mod cli;
pub mod config;
pub mod errors;
pub mod io;
pub mod models;
pub mod providers;
pub mod scheduler;

pub use errors::Error;
