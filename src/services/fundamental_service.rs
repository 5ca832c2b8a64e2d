//! Fundamental Service
//!
//! Loads parsed statements for a ticker, converts them and merges the
//! quarterly history into the stored per-ticker document.

use crate::error::{AppError, Result};
use crate::fundamentals::convert::{quarterly_entries, ratios_snapshot, sector_snapshot};
use crate::fundamentals::{
    merge_quarterly, FundamentalData, FundamentalDocument, StatementVariant,
};
use crate::services::indexing_service::SkippedTicker;
use crate::state::AppState;
use serde::Serialize;
use tracing::{error, info, warn};

/// Outcome of a fundamentals sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub tickers_synced: usize,
    pub skipped: Vec<SkippedTicker>,
    /// Quarterly entries across all synced documents
    pub quarterly_entries: usize,
}

/// Fundamental service for business logic
pub struct FundamentalService;

impl FundamentalService {
    /// Fetch statements, consolidated first, standalone as fallback
    pub async fn fetch_statements(state: &AppState, ticker: &str) -> Result<FundamentalData> {
        let delay = state.config.request_delay;

        let consolidated = state
            .statements
            .fetch(ticker, StatementVariant::Consolidated)
            .await;
        tokio::time::sleep(delay).await;

        let partial = match consolidated {
            Ok(Some(data)) if !data.quarterly.rows.is_empty() => return Ok(data),
            Ok(Some(data)) => {
                info!("{}: consolidated statements have no quarterly table, trying standalone", ticker);
                Some(data)
            }
            Ok(None) => {
                info!("{}: no consolidated statements, trying standalone", ticker);
                None
            }
            Err(e) => {
                error!("Failed for consolidated {}: {}", ticker, e);
                None
            }
        };

        let standalone = match state
            .statements
            .fetch(ticker, StatementVariant::Standalone)
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_recoverable() && partial.is_some() => {
                warn!("Failed for standalone {}, keeping consolidated data: {}", ticker, e);
                None
            }
            Err(e) => return Err(e),
        };
        tokio::time::sleep(delay).await;

        standalone.or(partial).ok_or_else(|| {
            AppError::FetchUnavailable(format!("no statements published for {}", ticker))
        })
    }

    /// Build the document to store from fresh statements and the stored one
    pub fn build_document(
        ticker: &str,
        data: &FundamentalData,
        existing: Option<&FundamentalDocument>,
    ) -> FundamentalDocument {
        let fresh = quarterly_entries(&data.quarterly);
        let quarterly = merge_quarterly(existing.map(|doc| doc.quarterly.as_slice()), fresh);

        FundamentalDocument {
            ticker: ticker.to_string(),
            market_cap: data.market_cap,
            sector: sector_snapshot(&data.sector),
            ratios: ratios_snapshot(&data.ratios),
            quarterly,
        }
    }

    /// Sync one ticker
    pub async fn sync_ticker(state: &AppState, ticker: &str) -> Result<FundamentalDocument> {
        info!("FundamentalService::sync_ticker - {}", ticker);

        let data = Self::fetch_statements(state, ticker).await?;
        let existing = state.fundamentals.get_fundamentals(ticker)?;
        let document = Self::build_document(ticker, &data, existing.as_ref());

        state.fundamentals.put_fundamentals(&document)?;
        info!(
            ticker = %ticker,
            "Stored {} quarterly entries ({} previously)",
            document.quarterly.len(),
            existing.map(|doc| doc.quarterly.len()).unwrap_or(0)
        );
        Ok(document)
    }

    /// Sync every configured ticker, skipping the ones that fail
    pub async fn sync_all(state: &AppState) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();

        for ticker in &state.config.tickers {
            match Self::sync_ticker(state, ticker).await {
                Ok(document) => {
                    summary.tickers_synced += 1;
                    summary.quarterly_entries += document.quarterly.len();
                }
                Err(e) if e.is_recoverable() => {
                    warn!(ticker = %ticker, code = e.code(), "Skipping fundamentals: {}", e);
                    summary.skipped.push(SkippedTicker {
                        ticker: ticker.clone(),
                        code: e.code(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            tickers_synced = summary.tickers_synced,
            skipped = summary.skipped.len(),
            "Fundamentals sync complete"
        );
        Ok(summary)
    }
}
