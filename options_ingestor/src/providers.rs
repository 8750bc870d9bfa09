//! Provider abstraction for the upstream options feed.
//!
//! This module defines the [`OptionsFeed`] trait, the seam between the fetch
//! scheduler and a concrete market-data vendor. The scheduler only needs two
//! calls: fetch the current chain snapshot of a symbol, and poke the vendor's
//! refresh endpoint when the snapshot turned out stale.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`dyn OptionsFeed`), so tests can swap in a scripted feed.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use options_ingestor::models::quote::ChainSnapshot;
//! use options_ingestor::providers::{FeedError, OptionsFeed};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl OptionsFeed for Offline {
//!     async fn fetch_chain(&self, symbol: &str, _exception: bool) -> Result<ChainSnapshot, FeedError> {
//!         Err(FeedError::http(404, None, format!("offline://{symbol}")))
//!     }
//!
//!     async fn request_refresh(&self, _symbol: &str, _exception: bool) -> Result<(), FeedError> {
//!         Ok(())
//!     }
//! }
//! ```

pub mod cboe;

use std::time::Duration;

use async_trait::async_trait;
use snafu::{Backtrace, GenerateImplicitData, Snafu};

use crate::models::quote::ChainSnapshot;

/// Trait for pulling chain snapshots from an options data vendor.
#[async_trait]
pub trait OptionsFeed: Send + Sync {
    /// Fetches the current chain snapshot for `symbol`.
    ///
    /// `exception` is true when the symbol belongs to the exception symbol set
    /// and the vendor expects its marker-prefixed form.
    async fn fetch_chain(&self, symbol: &str, exception: bool) -> Result<ChainSnapshot, FeedError>;

    /// Asks the vendor to rebuild its cached snapshot for `symbol`.
    ///
    /// The response body is irrelevant; callers treat this as fire-and-forget.
    async fn request_refresh(&self, symbol: &str, exception: bool) -> Result<(), FeedError>;
}

#[async_trait]
impl<T: OptionsFeed + ?Sized> OptionsFeed for std::sync::Arc<T> {
    async fn fetch_chain(&self, symbol: &str, exception: bool) -> Result<ChainSnapshot, FeedError> {
        (**self).fetch_chain(symbol, exception).await
    }

    async fn request_refresh(&self, symbol: &str, exception: bool) -> Result<(), FeedError> {
        (**self).request_refresh(symbol, exception).await
    }
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FeedInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within an `OptionsFeed` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FeedError {
    /// Network failure, timeout or undecodable body.
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The vendor answered with a non-success status.
    #[snafu(display("HTTP {status} from {url}"))]
    Status {
        status: u16,
        /// Seconds from the `Retry-After` header, when the vendor sent one.
        retry_after: Option<u64>,
        url: String,
        backtrace: Backtrace,
    },

    /// The body decoded but its content is unusable.
    #[snafu(display("Malformed payload: {message}"))]
    Payload {
        message: String,
        backtrace: Backtrace,
    },
}

impl FeedError {
    /// Builds a [`FeedError::Status`] outside of a snafu context.
    pub fn http(status: u16, retry_after: Option<u64>, url: impl Into<String>) -> Self {
        Self::Status {
            status,
            retry_after,
            url: url.into(),
            backtrace: Backtrace::generate(),
        }
    }

    /// Builds a [`FeedError::Payload`].
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
            backtrace: Backtrace::generate(),
        }
    }

    /// HTTP status, if the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Reqwest { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Payload { .. } => None,
        }
    }

    /// Explicit wait requested by the vendor.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// True if the status is one the scheduler retries.
    pub fn is_retryable(&self, retryable: &[u16]) -> bool {
        self.status().is_some_and(|s| retryable.contains(&s))
    }
}

impl From<reqwest::Error> for FeedInitError {
    fn from(source: reqwest::Error) -> Self {
        Self::ClientBuild {
            source,
            backtrace: Backtrace::generate(),
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(source: reqwest::Error) -> Self {
        Self::Reqwest {
            source,
            backtrace: Backtrace::generate(),
        }
    }
}
