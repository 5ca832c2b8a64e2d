//! Runtime configuration
//!
//! Read from the process environment, optionally seeded from a `.env` file.
//! Every variable is prefixed `INDEXER_`.

use crate::error::{AppError, Result};
use crate::market::IndicatorConfig;
use crate::providers::yahoo::DEFAULT_BASE_URL;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Document/fundamentals store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// DuckDB prices + SQLite fundamentals
    Embedded,
    /// In-process maps, nothing persisted
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" | "embedded" => Ok(StoreBackend::Embedded),
            "memory" | "dry-run" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub duckdb_path: PathBuf,
    pub sqlite_path: PathBuf,
    /// Price index (table) name
    pub price_index: String,
    pub benchmark: String,
    pub tickers: Vec<String>,
    /// First date of a full backfill
    pub start_date: NaiveDate,
    /// Tickers per provider request
    pub batch_size: usize,
    /// Trailing rows rewritten by an incremental run
    pub incremental_window: usize,
    /// Calendar days of history fetched by an incremental run
    pub lookback_days: i64,
    pub indicators: IndicatorConfig,
    pub provider_url: String,
    pub provider_timeout: Duration,
    pub fundamentals_dir: PathBuf,
    /// Pause between fundamentals requests
    pub request_delay: Duration,
}

impl Config {
    /// Load from the environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tickers = match (get("INDEXER_TICKERS"), get("INDEXER_TICKERS_FILE")) {
            (Some(list), _) => parse_ticker_list(&list),
            (None, Some(file)) => {
                let body = std::fs::read_to_string(&file).map_err(|e| {
                    AppError::Config(format!("INDEXER_TICKERS_FILE: cannot read {}: {}", file, e))
                })?;
                parse_ticker_list(&body)
            }
            (None, None) => Vec::new(),
        };

        let defaults = IndicatorConfig::default();
        let config = Self {
            backend: parse_or(&get, "INDEXER_STORE", StoreBackend::Embedded)?,
            duckdb_path: get("INDEXER_DUCKDB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/prices.duckdb")),
            sqlite_path: get("INDEXER_SQLITE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/fundamentals.db")),
            price_index: get("INDEXER_PRICE_INDEX").unwrap_or_else(|| "nifty_data".to_string()),
            benchmark: get("INDEXER_BENCHMARK").unwrap_or_else(|| "^NSEI".to_string()),
            tickers,
            start_date: parse_or(
                &get,
                "INDEXER_START_DATE",
                NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            )?,
            batch_size: parse_or(&get, "INDEXER_BATCH_SIZE", 50usize)?,
            incremental_window: parse_or(&get, "INDEXER_INCREMENTAL_WINDOW", 5usize)?,
            lookback_days: parse_or(&get, "INDEXER_LOOKBACK_DAYS", 60i64)?,
            indicators: IndicatorConfig {
                rsi_period: parse_or(&get, "INDEXER_RSI_PERIOD", defaults.rsi_period)?,
                atr_period: parse_or(&get, "INDEXER_ATR_PERIOD", defaults.atr_period)?,
                roc_period: parse_or(&get, "INDEXER_ROC_PERIOD", defaults.roc_period)?,
            },
            provider_url: get("INDEXER_PROVIDER_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            provider_timeout: Duration::from_secs(parse_or(&get, "INDEXER_PROVIDER_TIMEOUT_SECS", 30u64)?),
            fundamentals_dir: get("INDEXER_FUNDAMENTALS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/fundamentals")),
            request_delay: Duration::from_millis(parse_or(&get, "INDEXER_REQUEST_DELAY_MS", 1000u64)?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config("INDEXER_BATCH_SIZE must be at least 1".to_string()));
        }
        if self.incremental_window == 0 {
            return Err(AppError::Config(
                "INDEXER_INCREMENTAL_WINDOW must be at least 1".to_string(),
            ));
        }
        if self.lookback_days < 1 {
            return Err(AppError::Config("INDEXER_LOOKBACK_DAYS must be at least 1".to_string()));
        }
        let p = &self.indicators;
        if p.rsi_period == 0 || p.atr_period == 0 || p.roc_period == 0 {
            return Err(AppError::Config("Indicator periods must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{}: invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

/// Split a comma/newline separated ticker list, dropping blanks and duplicates
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in raw.split([',', '\n']).map(str::trim).filter(|t| !t.is_empty()) {
        if !tickers.iter().any(|t| t == ticker) {
            tickers.push(ticker.to_string());
        }
    }
    tickers
}
