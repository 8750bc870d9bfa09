//! Exception symbols: underlyings (mostly index products) whose upstream symbol
//! carries a marker prefix.
//!
//! The CDN chain endpoint expects `_SPX`, the refresh endpoint expects `^SPX`,
//! and the raw rows come back with `_SPX` as their symbol. Index contract codes
//! do not reliably embed the canonical ticker (SPX chains list `SPXW...`
//! contracts), so the canonical option symbol of an exception underlying is the
//! stripped underlying itself.
//!
//! Normalization mirrors the catalog rules: trim, uppercase, strip markers,
//! drop empties and de-duplicate while preserving the first occurrence.

use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Marker used by the CDN chain endpoint and in raw symbols.
pub const CDN_MARKER: char = '_';

/// Marker used by the refresh endpoint.
pub const REFRESH_MARKER: char = '^';

/// Strips any leading marker characters from an upstream symbol.
pub fn strip_marker(symbol: &str) -> &str {
    symbol.trim().trim_start_matches([CDN_MARKER, REFRESH_MARKER])
}

/// Normalized, ordered set of exception tickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExceptionSymbolSet(IndexSet<String>);

impl ExceptionSymbolSet {
    /// Builds a set from raw tickers, normalizing each entry.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = symbols
            .into_iter()
            .map(|s| strip_marker(s.as_ref()).to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self(set)
    }

    /// Reads a JSON array of tickers (`["SPX", "VIX", ...]`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        let raw: Vec<String> = serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(raw))
    }

    /// True if the (possibly marker-prefixed) symbol is an exception symbol.
    pub fn contains(&self, symbol: &str) -> bool {
        self.0.contains(&strip_marker(symbol).to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for ExceptionSymbolSet {
    fn from(v: Vec<String>) -> Self {
        Self::new(v)
    }
}

impl From<ExceptionSymbolSet> for Vec<String> {
    fn from(set: ExceptionSymbolSet) -> Self {
        set.0.into_iter().collect()
    }
}
