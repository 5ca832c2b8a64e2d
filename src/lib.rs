//! OHLCV Indexer
//!
//! Enriches daily price series with RSI, ATR and ROC (absolute and relative to
//! a benchmark index) and upserts one document per (ticker, date). Also keeps
//! per-ticker fundamentals with a merged quarterly history.

pub mod commands;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod fundamentals;
pub mod market;
pub mod providers;
pub mod scheduler;
pub mod services;
pub mod state;

use commands::{menu, Cli};
use config::{Config, StoreBackend};
use error::Result;
use state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ohlcv_indexer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Run one CLI invocation to completion
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if cli.dry_run {
        config.backend = StoreBackend::Memory;
    }

    let command = match cli.command {
        Some(command) => command,
        None => {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            menu::choose_command(&mut input, &mut output)?
        }
    };

    tracing::info!("Starting OHLCV indexer: {:?}", command);
    let state = AppState::new(config)?;
    commands::dispatch(&state, command).await
}
