//! Pipeline environment shared by the fetch and store binaries.
//!
//! Every job reads the same handful of variables:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `DATA_DIR` | source root holding raw partitions and the committed checkpoint | required by store jobs |
//! | `TEMP_DIR` | working/output root for this run | required on access |
//! | `MAX_DATES_LIMIT` | date partitions consolidated per run | `5` |
//! | `MATRIX_ID` | batch identifier for sharded fetch runs | unset |
//! | `BATCH_FILE` | JSON array of symbols for this batch | unset |
//! | `BATCH_CHUNK_SIZE` | symbols per batch file written by `split` | `100` |
//! | `RELEASE_NAME` | label stamped on artifacts | now, `%Y-%m-%d %H:%M` |
//! | `EXCEPTION_SYMBOLS_FILE` | JSON array of marker-prefixed tickers | `data/cboe-exception-symbols.json` |

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::env::{InvalidEnvVarError, MissingEnvVarError, get_env_var_opt, parse_env_var_or};

/// Default number of date partitions processed by one consolidation run.
pub const DEFAULT_MAX_DATES_LIMIT: usize = 5;

/// Default number of symbols per batch membership file.
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 100;

/// Default location of the exception symbol list.
pub const DEFAULT_EXCEPTION_SYMBOLS_FILE: &str = "data/cboe-exception-symbols.json";

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVarError),

    /// An environment variable holds a value that cannot be used.
    #[error(transparent)]
    InvalidEnvVar(#[from] InvalidEnvVarError),

    /// A value is present but semantically invalid.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Resolved pipeline environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEnv {
    /// Source root (`DATA_DIR`).
    pub data_dir: Option<PathBuf>,
    /// Working/output root (`TEMP_DIR`).
    pub temp_dir: Option<PathBuf>,
    /// Partitions processed per consolidation run (`MAX_DATES_LIMIT`).
    pub max_dates_limit: usize,
    /// Batch identifier (`MATRIX_ID`).
    pub matrix_id: Option<String>,
    /// Batch membership file (`BATCH_FILE`).
    pub batch_file: Option<PathBuf>,
    /// Symbols per batch file when splitting (`BATCH_CHUNK_SIZE`).
    pub batch_chunk_size: usize,
    /// Release label (`RELEASE_NAME`).
    pub release_name: String,
    /// Exception symbol list (`EXCEPTION_SYMBOLS_FILE`).
    pub exception_symbols_file: PathBuf,
}

impl PipelineEnv {
    /// Reads the pipeline environment from the process environment.
    ///
    /// `DATA_DIR` and `TEMP_DIR` are only checked when a job asks for them via
    /// [`PipelineEnv::data_dir`] / [`PipelineEnv::temp_dir`], since the fetch
    /// job never touches the source root.
    ///
    /// Errors:
    /// - `MAX_DATES_LIMIT` or `BATCH_CHUNK_SIZE` not a positive integer
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = get_env_var_opt("DATA_DIR").map(PathBuf::from);
        let temp_dir = get_env_var_opt("TEMP_DIR").map(PathBuf::from);

        let max_dates_limit = parse_env_var_or("MAX_DATES_LIMIT", DEFAULT_MAX_DATES_LIMIT)?;
        if max_dates_limit == 0 {
            return Err(ConfigError::Invalid(
                "MAX_DATES_LIMIT must be at least 1".to_string(),
            ));
        }

        let batch_chunk_size = parse_env_var_or("BATCH_CHUNK_SIZE", DEFAULT_BATCH_CHUNK_SIZE)?;
        if batch_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "BATCH_CHUNK_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            data_dir,
            temp_dir,
            max_dates_limit,
            matrix_id: get_env_var_opt("MATRIX_ID"),
            batch_file: get_env_var_opt("BATCH_FILE").map(PathBuf::from),
            batch_chunk_size,
            release_name: get_env_var_opt("RELEASE_NAME").unwrap_or_else(default_release_name),
            exception_symbols_file: get_env_var_opt("EXCEPTION_SYMBOLS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXCEPTION_SYMBOLS_FILE)),
        })
    }

    /// Source root, required by every store job.
    pub fn data_dir(&self) -> Result<&Path, ConfigError> {
        self.data_dir
            .as_deref()
            .ok_or_else(|| MissingEnvVarError("DATA_DIR".to_string()).into())
    }

    /// Working/output root, required by every job.
    pub fn temp_dir(&self) -> Result<&Path, ConfigError> {
        self.temp_dir
            .as_deref()
            .ok_or_else(|| MissingEnvVarError("TEMP_DIR".to_string()).into())
    }

    /// Batch identifier, or `"0"` for unsharded runs.
    pub fn batch_id(&self) -> &str {
        self.matrix_id.as_deref().unwrap_or("0")
    }
}

/// Release label used when `RELEASE_NAME` is unset.
pub fn default_release_name() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "DATA_DIR",
        "TEMP_DIR",
        "MAX_DATES_LIMIT",
        "MATRIX_ID",
        "BATCH_FILE",
        "BATCH_CHUNK_SIZE",
        "RELEASE_NAME",
        "EXCEPTION_SYMBOLS_FILE",
    ];

    fn clear() {
        for v in VARS {
            unsafe {
                std::env::remove_var(v);
            }
        }
    }

    #[test]
    #[serial]
    fn dirs_are_checked_on_access() {
        clear();
        let env = PipelineEnv::from_env().unwrap();
        let err = env.data_dir().unwrap_err();
        assert!(err.to_string().contains("DATA_DIR"));

        unsafe {
            std::env::set_var("DATA_DIR", "/data");
        }
        let env = PipelineEnv::from_env().unwrap();
        assert_eq!(env.data_dir().unwrap(), Path::new("/data"));
        let err = env.temp_dir().unwrap_err();
        assert!(err.to_string().contains("TEMP_DIR"));
        clear();
    }

    #[test]
    #[serial]
    fn defaults_and_overrides() {
        clear();
        unsafe {
            std::env::set_var("DATA_DIR", "/data");
            std::env::set_var("TEMP_DIR", "/tmp/work");
            std::env::set_var("RELEASE_NAME", "CBOE_OPTIONS_DATA_2024-03-01");
        }
        let env = PipelineEnv::from_env().unwrap();
        assert_eq!(env.max_dates_limit, DEFAULT_MAX_DATES_LIMIT);
        assert_eq!(env.batch_id(), "0");
        assert_eq!(env.batch_chunk_size, DEFAULT_BATCH_CHUNK_SIZE);
        assert_eq!(env.release_name, "CBOE_OPTIONS_DATA_2024-03-01");
        assert_eq!(
            env.exception_symbols_file,
            PathBuf::from(DEFAULT_EXCEPTION_SYMBOLS_FILE)
        );

        unsafe {
            std::env::set_var("MAX_DATES_LIMIT", "0");
        }
        assert!(matches!(
            PipelineEnv::from_env(),
            Err(ConfigError::Invalid(_))
        ));

        unsafe {
            std::env::set_var("MAX_DATES_LIMIT", "3");
            std::env::set_var("BATCH_CHUNK_SIZE", "0");
        }
        assert!(matches!(
            PipelineEnv::from_env(),
            Err(ConfigError::Invalid(_))
        ));
        clear();
    }
}
