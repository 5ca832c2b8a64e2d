//! Application state management

use crate::config::{Config, StoreBackend};
use crate::db::duckdb::DuckDb;
use crate::db::memory::MemoryStore;
use crate::db::sqlite::SqliteDb;
use crate::db::{DocumentStore, FundamentalsStore};
use crate::error::Result;
use crate::fundamentals::{FundamentalsSource, JsonFileSource};
use crate::providers::{PriceProvider, YahooProvider};
use crate::scheduler::MarketClock;
use std::path::Path;
use std::sync::Arc;

/// Collaborators shared by every run
pub struct AppState {
    pub config: Config,

    /// Price index store
    pub store: Arc<dyn DocumentStore>,

    /// Per-ticker fundamentals store
    pub fundamentals: Arc<dyn FundamentalsStore>,

    /// Daily bars source
    pub provider: Arc<dyn PriceProvider>,

    /// Parsed statements source
    pub statements: Arc<dyn FundamentalsSource>,

    pub clock: MarketClock,
}

impl AppState {
    /// Build the state selected by `config`
    pub fn new(config: Config) -> Result<Self> {
        let (store, fundamentals): (Arc<dyn DocumentStore>, Arc<dyn FundamentalsStore>) =
            match config.backend {
                StoreBackend::Embedded => {
                    ensure_parent_dir(&config.duckdb_path)?;
                    ensure_parent_dir(&config.sqlite_path)?;
                    tracing::info!("Price store: {:?}", config.duckdb_path);
                    tracing::info!("Fundamentals store: {:?}", config.sqlite_path);
                    let store: Arc<dyn DocumentStore> = Arc::new(DuckDb::new(&config.duckdb_path)?);
                    let fundamentals: Arc<dyn FundamentalsStore> =
                        Arc::new(SqliteDb::new(&config.sqlite_path)?);
                    (store, fundamentals)
                }
                StoreBackend::Memory => {
                    tracing::warn!("Using in-memory store, nothing will be persisted");
                    let memory = Arc::new(MemoryStore::new());
                    let store: Arc<dyn DocumentStore> = memory.clone();
                    let fundamentals: Arc<dyn FundamentalsStore> = memory;
                    (store, fundamentals)
                }
            };

        let provider = Arc::new(YahooProvider::new(
            config.provider_url.clone(),
            config.provider_timeout,
        )?);
        let statements = Arc::new(JsonFileSource::new(config.fundamentals_dir.clone()));

        Ok(Self::with_collaborators(config, store, fundamentals, provider, statements))
    }

    /// Assemble state from explicit collaborators
    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn DocumentStore>,
        fundamentals: Arc<dyn FundamentalsStore>,
        provider: Arc<dyn PriceProvider>,
        statements: Arc<dyn FundamentalsSource>,
    ) -> Self {
        Self {
            config,
            store,
            fundamentals,
            provider,
            statements,
            clock: MarketClock::nse(),
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
