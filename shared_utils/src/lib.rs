//! Helpers shared by the pipeline crates: environment access, the pipeline
//! configuration and tracing setup.

pub mod config;
pub mod env;
pub mod logging;
