use anyhow::Context;
use clap::Parser;
use ohlcv_indexer::commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ohlcv_indexer::init_tracing();

    let cli = Cli::parse();
    ohlcv_indexer::run(cli)
        .await
        .context("indexer run failed")
}
