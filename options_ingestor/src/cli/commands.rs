use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shared_utils::config::PipelineEnv;
use tracing::info;

use crate::config::{FetchSettings, load_settings_path};
use crate::io::finalize::finalize_batches;
use crate::io::sink::{BatchDirSink, DataSink};
use crate::io::symbols::{load_symbol_list, parse_symbol_arg, split_batches};
use crate::models::exception_symbols::ExceptionSymbolSet;
use crate::providers::cboe::CboeProvider;
use crate::scheduler::FetchScheduler;

/// Batch outputs live below `<TEMP_DIR>/options-data`.
pub const BATCH_ROOT: &str = "options-data";

#[derive(Parser)]
#[command(author, version, about = "Fetch CBOE options chains into raw parquet batches")]
pub struct Cli {
    /// Path to the fetch settings file (TOML). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a symbol list into batch files for sharded fetch runs
    Split {
        /// JSON array of symbols to split
        #[arg(long, value_name = "FILE", conflicts_with = "symbols")]
        symbols_file: Option<PathBuf>,

        /// Comma-separated list of symbols to split
        #[arg(long)]
        symbols: Option<String>,

        /// Symbols per batch; defaults to $BATCH_CHUNK_SIZE or 100
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Output root for `batches/` and the manifest; defaults to $TEMP_DIR
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Fetch one batch of symbols
    Fetch {
        /// Comma-separated list of symbols (e.g. "AAPL,SPX"); overrides the batch file
        #[arg(long)]
        symbols: Option<String>,

        /// JSON array of symbols; defaults to $BATCH_FILE
        #[arg(long, value_name = "FILE")]
        batch_file: Option<PathBuf>,

        /// Batch identifier; defaults to $MATRIX_ID or "0"
        #[arg(long)]
        batch_id: Option<String>,

        /// Exception symbol list; defaults to $EXCEPTION_SYMBOLS_FILE
        #[arg(long, value_name = "FILE")]
        exceptions: Option<PathBuf>,

        /// Work root; defaults to $TEMP_DIR
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
    },

    /// Merge every batch output into the raw date partitions
    Finalize {
        /// Work root holding `options-data/batch-*`; defaults to $TEMP_DIR
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Data root receiving `w2/` and `ohlc/` partitions; defaults to $DATA_DIR
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// Release label used as the partition file name; defaults to $RELEASE_NAME
        #[arg(long)]
        release: Option<String>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let env = PipelineEnv::from_env()?;
    let settings = match &cli.config {
        Some(path) => load_settings_path(path)
            .with_context(|| format!("loading fetch settings from {}", path.display()))?,
        None => FetchSettings::default(),
    };

    match cli.command {
        Commands::Split {
            symbols_file,
            symbols,
            chunk_size,
            out_dir,
        } => {
            let symbols = match (symbols, symbols_file) {
                (Some(list), _) => parse_symbol_arg(&list),
                (None, Some(file)) => load_symbol_list(&file)
                    .with_context(|| format!("loading symbol list {}", file.display()))?,
                (None, None) => bail!("no symbols: pass --symbols or --symbols-file"),
            };
            let out_root = resolve_dir(out_dir, env.temp_dir())?;
            let chunk_size = chunk_size.unwrap_or(env.batch_chunk_size);
            let manifest = split_batches(&symbols, chunk_size, &out_root)?;
            println!("{manifest}");
        }

        Commands::Fetch {
            symbols,
            batch_file,
            batch_id,
            exceptions,
            work_dir,
        } => {
            let symbols = match (symbols, batch_file.or_else(|| env.batch_file.clone())) {
                (Some(list), _) => parse_symbol_arg(&list),
                (None, Some(file)) => load_symbol_list(&file)
                    .with_context(|| format!("loading batch file {}", file.display()))?,
                (None, None) => bail!("no symbols: pass --symbols, --batch-file or set BATCH_FILE"),
            };
            let batch_id = batch_id.unwrap_or_else(|| env.batch_id().to_string());
            info!(count = symbols.len(), batch = %batch_id, "loaded symbols");

            let exceptions_path = exceptions.unwrap_or_else(|| env.exception_symbols_file.clone());
            let exceptions = ExceptionSymbolSet::load(&exceptions_path)?;
            info!(
                count = exceptions.len(),
                symbols = ?exceptions.iter().collect::<Vec<_>>(),
                "loaded exception symbols"
            );

            let work_root = resolve_dir(work_dir, env.temp_dir())?;
            let feed = CboeProvider::with_base_urls(
                &settings.feed.chain_base_url,
                &settings.feed.refresh_base_url,
            )?;
            let scheduler = FetchScheduler::new(feed, exceptions, settings.scheduler);
            let outcome = scheduler.run(symbols).await;

            let sink = BatchDirSink::new(work_root.join(BATCH_ROOT), &batch_id);
            sink.write(&outcome).await?;
            println!("{}", outcome.report);
        }

        Commands::Finalize {
            work_dir,
            data_dir,
            release,
        } => {
            let work_root = resolve_dir(work_dir, env.temp_dir())?;
            let data_root = resolve_dir(data_dir, env.data_dir())?;
            let release = release.unwrap_or_else(|| env.release_name.clone());
            let report = finalize_batches(&work_root.join(BATCH_ROOT), &data_root, &release)?;
            println!("{report}");
        }
    }

    Ok(())
}

fn resolve_dir<E>(flag: Option<PathBuf>, from_env: Result<&Path, E>) -> Result<PathBuf>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match flag {
        Some(dir) => Ok(dir),
        None => Ok(from_env?.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fetch_flags() {
        let cli = Cli::try_parse_from([
            "options-fetch",
            "--config",
            "fetch.toml",
            "fetch",
            "--symbols",
            "AAPL,SPX",
            "--batch-id",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("fetch.toml")));
        match cli.command {
            Commands::Fetch {
                symbols, batch_id, ..
            } => {
                assert_eq!(symbols.as_deref(), Some("AAPL,SPX"));
                assert_eq!(batch_id.as_deref(), Some("7"));
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn parses_split_flags() {
        let cli = Cli::try_parse_from([
            "options-fetch",
            "split",
            "--symbols-file",
            "watchlist.json",
            "--chunk-size",
            "25",
        ])
        .unwrap();
        match cli.command {
            Commands::Split {
                symbols_file,
                chunk_size,
                out_dir,
                ..
            } => {
                assert_eq!(symbols_file, Some(PathBuf::from("watchlist.json")));
                assert_eq!(chunk_size, Some(25));
                assert_eq!(out_dir, None);
            }
            _ => panic!("expected split"),
        }
        assert!(
            Cli::try_parse_from(["options-fetch", "split", "--symbols", "A", "--symbols-file", "f"])
                .is_err()
        );
    }

    #[test]
    fn finalize_takes_no_symbols() {
        assert!(Cli::try_parse_from(["options-fetch", "finalize", "--symbols", "A"]).is_err());
    }
}
