//! Canonical option and OHLC stores built from raw CBOE snapshots.
//!
//! The jobs in this crate run after the fetch batches have been finalized
//! into `dt=` partitions:
//! * [`consolidate`] canonicalizes new raw option partitions into the
//!   symbol-partitioned store, guarded by the [`checkpoint`];
//! * [`ohlc`] appends underlying bars not yet in the OHLC store;
//! * [`anomaly`] scores day-over-day open interest changes.

#![deny(missing_docs)]

pub mod anomaly;
pub mod canonical;
pub mod checkpoint;
pub mod consolidate;
pub mod error;
pub mod ohlc;
pub mod records;
pub mod scanner;

pub use error::{StoreError, StoreResult};
