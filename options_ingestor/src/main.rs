use clap::Parser;
use options_ingestor::cli::commands::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared_utils::logging::init();
    run(Cli::parse()).await
}
