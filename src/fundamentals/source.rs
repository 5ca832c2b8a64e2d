//! Fundamentals sources

use crate::error::{AppError, Result};
use crate::fundamentals::types::FundamentalData;
use async_trait::async_trait;
use std::path::PathBuf;

/// Statement flavour published for a company
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementVariant {
    Consolidated,
    Standalone,
}

impl StatementVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementVariant::Consolidated => "consolidated",
            StatementVariant::Standalone => "standalone",
        }
    }
}

/// Supplier of parsed company statements
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    fn id(&self) -> &'static str;

    /// `Ok(None)` when the source has nothing for this ticker and variant
    async fn fetch(&self, ticker: &str, variant: StatementVariant) -> Result<Option<FundamentalData>>;
}

/// Exchange suffix stripped from tickers (`TCS.NS` -> `TCS`)
pub fn company_symbol(ticker: &str) -> &str {
    ticker.split('.').next().unwrap_or(ticker)
}

/// Reads pre-parsed statements from `<dir>/<SYMBOL>.json` (consolidated)
/// and `<dir>/<SYMBOL>.standalone.json`.
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str, variant: StatementVariant) -> PathBuf {
        let symbol = company_symbol(ticker);
        match variant {
            StatementVariant::Consolidated => self.dir.join(format!("{}.json", symbol)),
            StatementVariant::Standalone => self.dir.join(format!("{}.standalone.json", symbol)),
        }
    }
}

#[async_trait]
impl FundamentalsSource for JsonFileSource {
    fn id(&self) -> &'static str {
        "json_file"
    }

    async fn fetch(&self, ticker: &str, variant: StatementVariant) -> Result<Option<FundamentalData>> {
        let path = self.path_for(ticker, variant);

        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No {} statements at {}", variant.as_str(), path.display());
                return Ok(None);
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let data: FundamentalData = serde_json::from_str(&body).map_err(|e| {
            AppError::Provider(format!("Malformed statements file {}: {}", path.display(), e))
        })?;

        Ok(Some(data))
    }
}
