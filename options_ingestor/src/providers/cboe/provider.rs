use async_trait::async_trait;
use reqwest::{Client, Response, header};
use tracing::debug;

use crate::models::exception_symbols::{CDN_MARKER, REFRESH_MARKER};
use crate::models::quote::ChainSnapshot;
use crate::providers::cboe::response::CboeChainResponse;
use crate::providers::{FeedError, FeedInitError, OptionsFeed};

pub const CDN_BASE_URL: &str = "https://cdn.cboe.com/api/global/delayed_quotes/options";
pub const SITE_BASE_URL: &str = "https://www.cboe.com/delayed_quote/api/options";

pub struct CboeProvider {
    client: Client,
    chain_base: String,
    refresh_base: String,
}

impl CboeProvider {
    /// Creates a provider against the public CBOE endpoints.
    pub fn new() -> Result<Self, FeedInitError> {
        Self::with_base_urls(CDN_BASE_URL, SITE_BASE_URL)
    }

    /// Creates a provider against custom endpoints (mirrors, local stubs).
    pub fn with_base_urls(
        chain_base: impl Into<String>,
        refresh_base: impl Into<String>,
    ) -> Result<Self, FeedInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            chain_base: chain_base.into().trim_end_matches('/').to_string(),
            refresh_base: refresh_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn chain_url(&self, symbol: &str, exception: bool) -> String {
        if exception {
            format!("{}/{CDN_MARKER}{symbol}.json", self.chain_base)
        } else {
            format!("{}/{symbol}.json", self.chain_base)
        }
    }

    pub fn refresh_url(&self, symbol: &str, exception: bool) -> String {
        if exception {
            format!("{}/{REFRESH_MARKER}{symbol}", self.refresh_base)
        } else {
            format!("{}/{symbol}", self.refresh_base)
        }
    }

    async fn get(&self, url: &str) -> Result<Response, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            return Err(FeedError::http(status.as_u16(), retry_after, url));
        }
        Ok(response)
    }
}

#[async_trait]
impl OptionsFeed for CboeProvider {
    async fn fetch_chain(&self, symbol: &str, exception: bool) -> Result<ChainSnapshot, FeedError> {
        let url = self.chain_url(symbol, exception);
        debug!(%url, "fetching chain");
        let doc = self.get(&url).await?.json::<CboeChainResponse>().await?;
        doc.into_snapshot()
    }

    async fn request_refresh(&self, symbol: &str, exception: bool) -> Result<(), FeedError> {
        let url = self.refresh_url(symbol, exception);
        debug!(%url, "requesting refresh");
        self.get(&url).await.map(drop)
    }
}

/// Reads `Retry-After` as whole seconds. HTTP-date values are ignored.
pub fn retry_after_secs(headers: &header::HeaderMap) -> Option<u64> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_use_marker_for_exception_symbols() {
        let p = CboeProvider::new().unwrap();
        assert_eq!(
            p.chain_url("AAPL", false),
            "https://cdn.cboe.com/api/global/delayed_quotes/options/AAPL.json"
        );
        assert_eq!(
            p.chain_url("SPX", true),
            "https://cdn.cboe.com/api/global/delayed_quotes/options/_SPX.json"
        );
        assert_eq!(
            p.refresh_url("SPX", true),
            "https://www.cboe.com/delayed_quote/api/options/^SPX"
        );
    }

    #[test]
    fn custom_base_urls_drop_trailing_slash() {
        let p = CboeProvider::with_base_urls("http://localhost:9000/chains/", "http://x/").unwrap();
        assert_eq!(p.chain_url("MSFT", false), "http://localhost:9000/chains/MSFT.json");
        assert_eq!(p.refresh_url("MSFT", false), "http://x/MSFT");
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = header::HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("5"));
        assert_eq!(retry_after_secs(&headers), Some(5));

        headers.insert(
            header::RETRY_AFTER,
            header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_secs(&headers), None);
    }
}
