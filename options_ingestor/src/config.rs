//! Fetch settings: parsing, defaults and validation.
//!
//! The `options-fetch` binary optionally takes a TOML file:
//!
//! ```toml
//! [scheduler]
//! max_attempts = 5
//! backoff_step_secs = 10
//! stale_after_minutes = 60
//! requeue_delay_secs = 10
//! max_requeues = 20
//! concurrency = 4
//! requests_per_second = 8
//! retryable_statuses = [429, 500, 502, 503, 504]
//!
//! [feed]
//! chain_base_url = "https://cdn.cboe.com/api/global/delayed_quotes/options"
//! refresh_base_url = "https://www.cboe.com/delayed_quote/api/options"
//! ```
//!
//! Every key is optional; an absent file means all defaults.
//!
//! Entrypoints: [`load_settings_str`], [`load_settings_path`].

use std::{num::NonZeroU32, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::providers::cboe::provider::{CDN_BASE_URL, SITE_BASE_URL};

/// Top-level fetch settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub scheduler: SchedulerConfig,
    pub feed: FeedEndpoints,
}

/// Retry, staleness and pacing knobs of the fetch scheduler.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Attempts per symbol before it is counted as failed.
    pub max_attempts: u32,
    /// Linear backoff step: the n-th retry (0-based) waits `step * (n + 1)`.
    pub backoff_step_secs: u64,
    /// Snapshots older than this are considered stale.
    pub stale_after_minutes: i64,
    /// Pause before re-fetching a requeued symbol that has nothing ahead of it.
    pub requeue_delay_secs: u64,
    /// Staleness requeues allowed per symbol.
    pub max_requeues: u32,
    /// Symbols fetched in parallel.
    pub concurrency: usize,
    /// Optional steady request quota shared by all workers.
    pub requests_per_second: Option<NonZeroU32>,
    /// HTTP statuses that trigger a backoff and retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_step_secs: 10,
            stale_after_minutes: 60,
            requeue_delay_secs: 10,
            max_requeues: 20,
            concurrency: 1,
            requests_per_second: None,
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl SchedulerConfig {
    /// Wait before the retry that follows failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_step_secs * (u64::from(attempt) + 1))
    }

    pub fn stale_after(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::minutes(self.stale_after_minutes)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_secs(self.requeue_delay_secs)
    }

    /// Rejects settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_attempts == 0 {
            return Err(Error::Config("scheduler.max_attempts must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("scheduler.concurrency must be at least 1".into()));
        }
        if self.stale_after_minutes <= 0 {
            return Err(Error::Config(
                "scheduler.stale_after_minutes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Base URLs of the upstream feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedEndpoints {
    pub chain_base_url: String,
    pub refresh_base_url: String,
}

impl Default for FeedEndpoints {
    fn default() -> Self {
        Self {
            chain_base_url: CDN_BASE_URL.to_string(),
            refresh_base_url: SITE_BASE_URL.to_string(),
        }
    }
}

/// Parses and validates settings from a TOML string.
pub fn load_settings_str(s: &str) -> Result<FetchSettings, Error> {
    let settings: FetchSettings =
        toml::from_str(s).map_err(|e| Error::Config(format!("invalid fetch settings: {e}")))?;
    settings.scheduler.validate()?;
    Ok(settings)
}

/// Reads, parses and validates settings from a file.
pub fn load_settings_path(path: impl AsRef<Path>) -> Result<FetchSettings, Error> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
    load_settings_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let s = load_settings_str("").unwrap();
        assert_eq!(s, FetchSettings::default());
        assert_eq!(s.scheduler.backoff(0), Duration::from_secs(10));
        assert_eq!(s.scheduler.backoff(4), Duration::from_secs(50));
        assert_eq!(s.feed.chain_base_url, CDN_BASE_URL);
    }

    #[test]
    fn partial_override() {
        let s = load_settings_str(
            r#"
            [scheduler]
            concurrency = 4
            requests_per_second = 8
            "#,
        )
        .unwrap();
        assert_eq!(s.scheduler.concurrency, 4);
        assert_eq!(s.scheduler.requests_per_second, NonZeroU32::new(8));
        assert_eq!(s.scheduler.max_attempts, 5);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_values() {
        assert!(load_settings_str("[scheduler]\nretries = 3").is_err());
        assert!(load_settings_str("[scheduler]\nconcurrency = 0").is_err());
        assert!(load_settings_str("[scheduler]\nmax_attempts = 0").is_err());
    }
}
