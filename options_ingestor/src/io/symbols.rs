use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::Serialize;
use tracing::info;

use crate::errors::Error;

/// Reads a batch membership file: a JSON array of symbols.
///
/// Entries are trimmed and uppercased; blanks and repeats are dropped, order
/// is kept.
pub fn load_symbol_list(path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
    let raw: Vec<String> = serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(normalize_symbols(raw))
}

/// Parses a comma separated list (`"AAPL, msft"`).
pub fn parse_symbol_arg(arg: &str) -> Vec<String> {
    normalize_symbols(arg.split(','))
}

/// Batch membership files live below `<out>/batches`.
pub const BATCHES_DIR: &str = "batches";
/// JSON array of every batch file path.
pub const BATCH_MANIFEST_FILE: &str = "batch-manifest.json";
/// JSON array of every symbol across the batches.
pub const ALL_SYMBOLS_FILE: &str = "all-symbols.json";

/// Files written by [`split_batches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchManifest {
    /// Batch membership files, `batch-1.json` first.
    pub batches: Vec<PathBuf>,
    /// Symbols spread over the batches.
    pub symbols: usize,
    /// Path of the manifest itself.
    pub manifest: PathBuf,
}

impl fmt::Display for BatchManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Split {} symbols into {} batches ({})",
            self.symbols,
            self.batches.len(),
            self.manifest.display()
        )
    }
}

/// Splits a symbol list into `<out>/batches/batch-<n>.json` files of at most
/// `chunk_size` symbols, numbered from 1, and writes
/// `<out>/batch-manifest.json` and `<out>/all-symbols.json` next to them.
///
/// Symbols are normalized the same way [`load_symbol_list`] does. An empty
/// list is an error, since a run with no batches has nothing to fetch.
pub fn split_batches<I, S>(symbols: I, chunk_size: usize, out_dir: &Path) -> Result<BatchManifest, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if chunk_size == 0 {
        return Err(Error::Config("batch chunk size must be at least 1".to_string()));
    }
    let symbols = normalize_symbols(symbols);
    if symbols.is_empty() {
        return Err(Error::Sink("no symbols to split into batches".to_string()));
    }

    let batch_dir = out_dir.join(BATCHES_DIR);
    std::fs::create_dir_all(&batch_dir).map_err(|e| Error::file(&batch_dir, e))?;

    let mut batches = Vec::with_capacity(symbols.len().div_ceil(chunk_size));
    for (index, chunk) in symbols.chunks(chunk_size).enumerate() {
        let path = batch_dir.join(format!("batch-{}.json", index + 1));
        write_json(&path, chunk)?;
        info!(path = %path.display(), count = chunk.len(), "wrote batch file");
        batches.push(path);
    }

    let manifest = out_dir.join(BATCH_MANIFEST_FILE);
    write_json(&manifest, &batches)?;
    write_json(&out_dir.join(ALL_SYMBOLS_FILE), &symbols)?;
    info!(batches = batches.len(), symbols = symbols.len(), "wrote batch manifest");

    Ok(BatchManifest {
        batches,
        symbols: symbols.len(),
        manifest,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|e| Error::file(path, e))
}

fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"["AAPL", "spx", " AAPL ", ""]"#).unwrap();
        assert_eq!(load_symbol_list(&path).unwrap(), vec!["AAPL", "SPX"]);
    }

    #[test]
    fn rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"{"symbols": []}"#).unwrap();
        assert!(matches!(load_symbol_list(&path), Err(Error::Json { .. })));
    }

    #[test]
    fn parses_cli_list() {
        assert_eq!(parse_symbol_arg("aapl, MSFT,,tsla"), vec!["AAPL", "MSFT", "TSLA"]);
    }

    #[test]
    fn splits_into_numbered_batches() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("temp");
        let manifest =
            split_batches(["aapl", "MSFT", "SPX", "AAPL", "TSLA", "QQQ"], 2, &out).unwrap();

        assert_eq!(manifest.symbols, 5);
        assert_eq!(
            manifest.batches,
            vec![
                out.join("batches/batch-1.json"),
                out.join("batches/batch-2.json"),
                out.join("batches/batch-3.json"),
            ]
        );
        assert_eq!(load_symbol_list(&manifest.batches[0]).unwrap(), vec!["AAPL", "MSFT"]);
        assert_eq!(load_symbol_list(&manifest.batches[2]).unwrap(), vec!["QQQ"]);
        assert_eq!(
            load_symbol_list(out.join(ALL_SYMBOLS_FILE)).unwrap(),
            vec!["AAPL", "MSFT", "SPX", "TSLA", "QQQ"]
        );

        let listed: Vec<PathBuf> =
            serde_json::from_str(&std::fs::read_to_string(&manifest.manifest).unwrap()).unwrap();
        assert_eq!(listed, manifest.batches);
        assert_eq!(
            manifest.to_string(),
            format!("Split 5 symbols into 3 batches ({})", manifest.manifest.display())
        );
    }

    #[test]
    fn split_rejects_empty_list_and_zero_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let empty: [&str; 0] = [];
        assert!(matches!(split_batches(empty, 100, dir.path()), Err(Error::Sink(_))));
        assert!(matches!(split_batches(["AAPL"], 0, dir.path()), Err(Error::Config(_))));
        assert!(!dir.path().join(BATCH_MANIFEST_FILE).exists());
    }
}
