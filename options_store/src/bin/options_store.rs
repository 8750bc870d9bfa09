use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use options_ingestor::io::finalize::{OHLC_PARTITION_ROOT, release_file_stem};
use options_ingestor::models::exception_symbols::ExceptionSymbolSet;
use options_store::anomaly::score_store;
use options_store::consolidate::{ConsolidationWriter, OUTPUT_DIR};
use options_store::ohlc::merge_ohlc;
use shared_utils::config::PipelineEnv;
use tracing::info;

/// Canonical OHLC store below `$DATA_DIR`.
const OHLC_STORE_DIR: &str = "ohlc-store";
const ANOMALY_FILE: &str = "options_cboe_oi_anomaly.parquet";

#[derive(Parser)]
#[command(version, about = "Consolidate, merge and score CBOE option data")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Canonicalize raw option partitions newer than the checkpoint
    Consolidate {
        /// Source root holding `w2/` and `config.json`; defaults to $DATA_DIR
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
        /// Work root; defaults to $TEMP_DIR
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
        /// Dates per run; defaults to $MAX_DATES_LIMIT
        #[arg(long)]
        max_dates: Option<usize>,
        /// Exception symbol list; defaults to $EXCEPTION_SYMBOLS_FILE
        #[arg(long, value_name = "FILE")]
        exceptions: Option<PathBuf>,
    },

    /// Append underlying bars not yet in the OHLC store
    MergeOhlc {
        /// Raw snapshot partitions; defaults to $DATA_DIR/ohlc
        #[arg(long, value_name = "DIR")]
        raw_dir: Option<PathBuf>,
        /// Canonical OHLC store; defaults to $DATA_DIR/ohlc-store
        #[arg(long, value_name = "DIR")]
        store_dir: Option<PathBuf>,
        /// Delta output root; defaults to the store itself
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// Run label; defaults to $RELEASE_NAME
        #[arg(long)]
        label: Option<String>,
    },

    /// Score day-over-day open interest changes of the option store
    ScoreAnomalies {
        /// Consolidated option store; defaults to $TEMP_DIR/w2-output
        #[arg(long, value_name = "DIR")]
        store_dir: Option<PathBuf>,
        /// Output file; defaults to $TEMP_DIR/options_cboe_oi_anomaly.parquet
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    shared_utils::logging::init();
    let cli = Cli::parse();
    let env = PipelineEnv::from_env()?;

    match cli.cmd {
        Cmd::Consolidate {
            data_dir,
            work_dir,
            max_dates,
            exceptions,
        } => {
            let data_dir = match data_dir {
                Some(dir) => dir,
                None => env.data_dir()?.to_path_buf(),
            };
            let work_dir = match work_dir {
                Some(dir) => dir,
                None => env.temp_dir()?.to_path_buf(),
            };
            let exceptions_path = exceptions.unwrap_or_else(|| env.exception_symbols_file.clone());
            let exceptions = ExceptionSymbolSet::load(&exceptions_path).with_context(|| {
                format!("loading exception symbols from {}", exceptions_path.display())
            })?;
            info!(count = exceptions.len(), "loaded exception symbols");

            let writer = ConsolidationWriter::new(
                data_dir,
                work_dir,
                max_dates.unwrap_or(env.max_dates_limit),
                exceptions,
            );
            let report = writer.run()?;
            println!("{report}");
        }

        Cmd::MergeOhlc {
            raw_dir,
            store_dir,
            out_dir,
            label,
        } => {
            let raw_dir = or_env(raw_dir, env.data_dir(), OHLC_PARTITION_ROOT)?;
            let store_dir = or_env(store_dir, env.data_dir(), OHLC_STORE_DIR)?;
            let out_dir = out_dir.unwrap_or_else(|| store_dir.clone());
            let label = release_file_stem(&label.unwrap_or_else(|| env.release_name.clone()));

            let outcome = merge_ohlc(&raw_dir, &store_dir, &out_dir, &label)?;
            match outcome.artifact {
                Some(path) => println!("Wrote {} new OHLC rows to {}", outcome.delta_rows, path.display()),
                None => println!("No new OHLC rows"),
            }
        }

        Cmd::ScoreAnomalies { store_dir, output } => {
            let store_dir = or_env(store_dir, env.temp_dir(), OUTPUT_DIR)?;
            let output = or_env(output, env.temp_dir(), ANOMALY_FILE)?;
            let scored = score_store(&store_dir, &output)?;
            println!("Scored {scored} rows into {}", output.display());
        }
    }

    Ok(())
}

/// The flag if given, otherwise `child` below the environment root.
fn or_env<E>(flag: Option<PathBuf>, root: Result<&Path, E>, child: &str) -> Result<PathBuf>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match flag {
        Some(path) => Ok(path),
        None => Ok(root?.join(child)),
    }
}
