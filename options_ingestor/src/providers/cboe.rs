//! CBOE delayed-quote feed.
//!
//! Chains come from the public CDN, refreshes go to the site API. Exception
//! symbols use `_` on the CDN and `^` on the site.

pub mod provider;
pub mod response;

pub use provider::CboeProvider;
