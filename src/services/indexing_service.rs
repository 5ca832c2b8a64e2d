//! Indexing Service
//!
//! Drives fetch -> normalize -> enrich -> build -> bulk write for the price
//! index. Per-ticker problems are recorded in the [`RunSummary`] and never stop
//! the run; a bulk write that fails as a whole does.

use crate::db::WriteError;
use crate::documents::{build_actions, price_index_schema, WriteMode};
use crate::error::{AppError, Result};
use crate::market::{benchmark_roc, enrich, extract_series, fill_sentinels, EnrichedRow};
use crate::providers::BatchFrame;
use crate::state::AppState;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A ticker left out of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTicker {
    pub ticker: String,
    pub code: &'static str,
    pub reason: String,
}

/// Outcome of one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub tickers_processed: usize,
    pub skipped: Vec<SkippedTicker>,
    pub documents_written: usize,
    pub documents_failed: usize,
    pub failures: Vec<WriteError>,
}

impl RunSummary {
    fn skip(&mut self, ticker: &str, error: &AppError) {
        warn!(ticker = %ticker, code = error.code(), "Skipping ticker: {}", error);
        self.skipped.push(SkippedTicker {
            ticker: ticker.to_string(),
            code: error.code(),
            reason: error.to_string(),
        });
    }

    fn log(&self, run: &str) {
        info!(
            tickers_processed = self.tickers_processed,
            skipped = self.skipped.len(),
            documents_written = self.documents_written,
            documents_failed = self.documents_failed,
            "{} run complete",
            run
        );
    }
}

/// Date range and write mode of one run
#[derive(Debug, Clone, Copy)]
struct RunPlan {
    /// First date requested from the provider
    fetch_start: NaiveDate,
    /// First date that may be written; earlier rows only warm up indicators
    write_from: NaiveDate,
    end: NaiveDate,
    mode: WriteMode,
}

/// Indexing service for business logic
pub struct IndexingService;

impl IndexingService {
    /// Create the price index if it does not exist yet
    pub fn ensure_index(state: &AppState) -> Result<()> {
        let index = &state.config.price_index;
        if !state.store.exists(index)? {
            info!("IndexingService::ensure_index - creating index {}", index);
            state.store.create(index, &price_index_schema())?;
        }
        Ok(())
    }

    /// Backfill every configured ticker from the configured start date
    pub async fn full_index(state: &AppState) -> Result<RunSummary> {
        let end = state.clock.current_date_to_index();
        Self::full_index_range(state, state.config.start_date, end).await
    }

    /// Full replace of every configured ticker over `start..=end`
    pub async fn full_index_range(
        state: &AppState,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RunSummary> {
        info!("IndexingService::full_index - {} to {}", start, end);

        let plan = RunPlan {
            fetch_start: start,
            write_from: start,
            end,
            mode: WriteMode::Full,
        };
        let summary = Self::run(state, &state.config.tickers, plan).await?;
        summary.log("Full");
        Ok(summary)
    }

    /// Refresh the trailing window of every configured ticker up to the
    /// market clock's current trading day
    pub async fn incremental_index(state: &AppState) -> Result<RunSummary> {
        let target = state.clock.current_date_to_index();
        Self::incremental_index_at(state, target).await
    }

    /// Incremental refresh ending at `target`
    pub async fn incremental_index_at(state: &AppState, target: NaiveDate) -> Result<RunSummary> {
        let fetch_start = target - Duration::days(state.config.lookback_days);
        info!(
            "IndexingService::incremental_index - target {} (history from {})",
            target, fetch_start
        );

        let plan = RunPlan {
            fetch_start,
            write_from: fetch_start,
            end: target,
            mode: WriteMode::Incremental {
                window: state.config.incremental_window,
            },
        };
        let summary = Self::run(state, &state.config.tickers, plan).await?;
        summary.log("Incremental");
        Ok(summary)
    }

    /// Replace one ticker's documents over `start..=end`
    pub async fn targeted_index(
        state: &AppState,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RunSummary> {
        info!(
            "IndexingService::targeted_index - {} {} to {}",
            ticker, start, end
        );
        if start > end {
            return Err(AppError::Validation(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        let plan = RunPlan {
            fetch_start: start - Duration::days(state.config.lookback_days),
            write_from: start,
            end,
            mode: WriteMode::Full,
        };
        let summary = Self::run(state, &[ticker.to_string()], plan).await?;
        summary.log("Targeted");
        Ok(summary)
    }

    async fn run(state: &AppState, tickers: &[String], plan: RunPlan) -> Result<RunSummary> {
        Self::ensure_index(state)?;

        let mut summary = RunSummary::default();
        if tickers.is_empty() {
            warn!("IndexingService::run - no tickers configured");
            return Ok(summary);
        }

        let benchmark = Self::fetch_benchmark(state, plan).await;

        for (batch, chunk) in tickers.chunks(state.config.batch_size).enumerate() {
            debug!("Fetching batch {} ({} tickers)", batch, chunk.len());

            let frame = match state.provider.fetch(chunk, plan.fetch_start, plan.end).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    let error = AppError::FetchUnavailable(format!(
                        "no data from {} for {} to {}",
                        state.provider.id(),
                        plan.fetch_start,
                        plan.end
                    ));
                    chunk.iter().for_each(|t| summary.skip(t, &error));
                    continue;
                }
                Err(e) if e.is_recoverable() => {
                    chunk.iter().for_each(|t| summary.skip(t, &e));
                    continue;
                }
                Err(e) => return Err(e),
            };

            if frame.is_empty() {
                info!(
                    "Batch {}: no trading days between {} and {}",
                    batch, plan.fetch_start, plan.end
                );
                summary.tickers_processed += chunk.len();
                continue;
            }

            for ticker in chunk {
                let rows = match Self::prepare_ticker(state, &frame, ticker, batch, plan, benchmark.as_ref()) {
                    Ok(rows) => rows,
                    Err(e) => {
                        summary.skip(ticker, &e);
                        continue;
                    }
                };

                let actions = build_actions(&state.config.price_index, ticker, &rows, plan.mode);
                summary.tickers_processed += 1;
                if actions.is_empty() {
                    debug!("{}: nothing to write", ticker);
                    continue;
                }

                // An Err here means the store rejected the whole batch
                let response = state.store.bulk_write(&actions).map_err(|e| {
                    AppError::WriteFailure(format!("bulk write for {} failed: {}", ticker, e))
                })?;

                if response.has_failures() {
                    warn!(
                        ticker = %ticker,
                        "{} of {} documents failed",
                        response.failures.len(),
                        actions.len()
                    );
                    for failure in &response.failures {
                        warn!(ticker = %ticker, id = %failure.id, "Write failed: {}", failure.reason);
                    }
                }
                info!(ticker = %ticker, "Indexed {} documents", response.success);

                summary.documents_written += response.success;
                summary.documents_failed += response.failures.len();
                summary.failures.extend(response.failures);
            }
        }

        Ok(summary)
    }

    /// Normalize, enrich and trim one ticker's slice of a batch
    fn prepare_ticker(
        state: &AppState,
        frame: &BatchFrame,
        ticker: &str,
        batch: usize,
        plan: RunPlan,
        benchmark: Option<&HashMap<NaiveDate, f64>>,
    ) -> Result<Vec<EnrichedRow>> {
        let series = extract_series(frame, ticker, batch)?;
        if series.is_empty() {
            return Err(AppError::FetchUnavailable(format!(
                "{} missing from batch {}",
                ticker, batch
            )));
        }

        let rows = fill_sentinels(enrich(&series, &state.config.indicators, benchmark));
        Ok(rows
            .into_iter()
            .filter(|row| row.date.valid().is_some_and(|d| d >= plan.write_from))
            .collect())
    }

    /// Benchmark ROC by date, fetched once per run
    async fn fetch_benchmark(state: &AppState, plan: RunPlan) -> Option<HashMap<NaiveDate, f64>> {
        let symbol = state.config.benchmark.clone();
        let frame = match state
            .provider
            .fetch(std::slice::from_ref(&symbol), plan.fetch_start, plan.end)
            .await
        {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!("Benchmark {} unavailable, roc_benchmark will be 0", symbol);
                return None;
            }
            Err(e) => {
                warn!("Benchmark {} fetch failed ({}), roc_benchmark will be 0", symbol, e);
                return None;
            }
        };

        match extract_series(&frame, &symbol, 0) {
            Ok(series) if !series.is_empty() => {
                Some(benchmark_roc(&series, state.config.indicators.roc_period))
            }
            Ok(_) => {
                warn!("Benchmark {} returned no rows", symbol);
                None
            }
            Err(e) => {
                warn!("Benchmark {} frame unusable: {}", symbol, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::db::{BulkResponse, DocumentStore, WriteError};
    use crate::documents::{Fields, IndexSchema, WriteAction};
    use crate::fundamentals::JsonFileSource;
    use crate::providers::{Cell, ColumnKey, PriceProvider};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    /// Serves daily closes per ticker; `open = close - 1`, `high = close + 1`,
    /// `low = close - 2`
    struct StubProvider {
        closes: HashMap<String, Vec<(NaiveDate, f64)>>,
        calls: Mutex<Vec<Vec<String>>>,
        without_close: Option<String>,
    }

    impl StubProvider {
        fn new(series: &[(&str, Vec<(NaiveDate, f64)>)]) -> Self {
            Self {
                closes: series
                    .iter()
                    .map(|(t, rows)| (t.to_string(), rows.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                without_close: None,
            }
        }

        /// Leave out the Close column of `ticker`, keeping its other fields
        fn without_close(mut self, ticker: &str) -> Self {
            self.without_close = Some(ticker.to_string());
            self
        }
    }

    #[async_trait]
    impl PriceProvider for StubProvider {
        fn id(&self) -> &'static str {
            "stub"
        }

        async fn fetch(
            &self,
            tickers: &[String],
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Option<BatchFrame>> {
            self.calls.lock().push(tickers.to_vec());

            let mut frame = BatchFrame::default();
            for ticker in tickers {
                let Some(rows) = self.closes.get(ticker) else {
                    continue;
                };
                let rows: Vec<_> = rows
                    .iter()
                    .filter(|(d, _)| *d >= start && *d <= end)
                    .collect();
                let col = |f: fn(f64) -> f64| rows.iter().map(|(_, c)| Cell::Number(f(*c))).collect();

                frame.insert_column(
                    ColumnKey::new("Date", ticker.as_str()),
                    rows.iter()
                        .map(|(d, _)| Cell::Text(d.format("%Y-%m-%d").to_string()))
                        .collect(),
                );
                frame.insert_column(ColumnKey::new("Open", ticker.as_str()), col(|c| c - 1.0));
                frame.insert_column(ColumnKey::new("High", ticker.as_str()), col(|c| c + 1.0));
                frame.insert_column(ColumnKey::new("Low", ticker.as_str()), col(|c| c - 2.0));
                if self.without_close.as_deref() != Some(ticker.as_str()) {
                    frame.insert_column(ColumnKey::new("Close", ticker.as_str()), col(|c| c));
                }
                frame.insert_column(ColumnKey::new("Volume", ticker.as_str()), col(|_| 1000.0));
            }

            if frame.tickers().is_empty() {
                return Ok(None);
            }
            Ok(Some(frame))
        }
    }

    /// Store whose bulk writes always fail outright
    struct BrokenStore;

    impl DocumentStore for BrokenStore {
        fn exists(&self, _index: &str) -> Result<bool> {
            Ok(true)
        }
        fn create(&self, _index: &str, _schema: &IndexSchema) -> Result<()> {
            Ok(())
        }
        fn bulk_write(&self, _actions: &[WriteAction]) -> Result<BulkResponse> {
            Err(AppError::Internal("connection reset".to_string()))
        }
        fn get(&self, _index: &str, _id: &str) -> Result<Option<Fields>> {
            Ok(None)
        }
    }

    /// Memory store that rejects one document id
    struct RejectingStore {
        inner: MemoryStore,
        reject: String,
    }

    impl DocumentStore for RejectingStore {
        fn exists(&self, index: &str) -> Result<bool> {
            self.inner.exists(index)
        }
        fn create(&self, index: &str, schema: &IndexSchema) -> Result<()> {
            self.inner.create(index, schema)
        }
        fn bulk_write(&self, actions: &[WriteAction]) -> Result<BulkResponse> {
            let (rejected, accepted): (Vec<WriteAction>, Vec<WriteAction>) =
                actions.iter().cloned().partition(|a| a.id() == self.reject);
            let mut response = self.inner.bulk_write(&accepted)?;
            response.failures.extend(rejected.iter().map(|a| WriteError {
                id: a.id().to_string(),
                reason: "mapper_parsing_exception".to_string(),
            }));
            Ok(response)
        }
        fn get(&self, index: &str, id: &str) -> Result<Option<Fields>> {
            self.inner.get(index, id)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn closes(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, c)| (day(i as u32 + 1), *c))
            .collect()
    }

    fn config(tickers: &[&str]) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.tickers = tickers.iter().map(|t| t.to_string()).collect();
        config.start_date = day(1);
        config.batch_size = 2;
        config.lookback_days = 30;
        config.indicators.rsi_period = 2;
        config.indicators.atr_period = 2;
        config
    }

    fn state_with(
        config: Config,
        store: Arc<dyn DocumentStore>,
        provider: Arc<StubProvider>,
    ) -> AppState {
        AppState::with_collaborators(
            config,
            store,
            Arc::new(MemoryStore::new()),
            provider,
            Arc::new(JsonFileSource::new("unused")),
        )
    }

    fn universe() -> Arc<StubProvider> {
        Arc::new(StubProvider::new(&[
            ("^NSEI", closes(&[200.0, 202.0, 204.0, 202.0, 206.0, 208.0])),
            ("TCS.NS", closes(&[100.0, 102.0, 101.0, 105.0, 107.0, 110.0])),
            ("INFY.NS", closes(&[50.0, 51.0, 49.0, 52.0, 53.0, 55.0])),
            ("HDFC.NS", closes(&[10.0, 11.0, 12.0, 11.0, 13.0, 14.0])),
        ]))
    }

    #[tokio::test]
    async fn test_targeted_run_writes_documents() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(config(&[]), store.clone(), universe());

        let summary = IndexingService::targeted_index(&state, "TCS.NS", day(1), day(6))
            .await
            .unwrap();

        assert_eq!(summary.tickers_processed, 1);
        assert_eq!(summary.documents_written, 6);
        assert!(summary.skipped.is_empty());

        let doc = store.get("nifty_data", "TCS.NS_2024-05-03").unwrap().unwrap();
        assert_eq!(doc["close"], json!(101.0));
        assert_eq!(doc["volume"], json!(1000));
        // (101 - 102) / 102 * 100
        let roc = doc["roc"].as_f64().unwrap();
        assert!((roc - (-100.0 / 102.0)).abs() < 1e-9);
        // first bar has no ROC yet
        let first = store.get("nifty_data", "TCS.NS_2024-05-01").unwrap().unwrap();
        assert_eq!(first["roc"], json!(0.0));
    }

    #[tokio::test]
    async fn test_targeted_run_writes_only_requested_range() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(config(&[]), store.clone(), universe());

        let summary = IndexingService::targeted_index(&state, "TCS.NS", day(4), day(5))
            .await
            .unwrap();

        assert_eq!(summary.documents_written, 2);
        assert!(store.get("nifty_data", "TCS.NS_2024-05-03").unwrap().is_none());
        // warm-up history makes RSI defined on the first written day
        let doc = store.get("nifty_data", "TCS.NS_2024-05-04").unwrap().unwrap();
        assert!(doc["rsi"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_targeted_rejects_inverted_range() {
        let state = state_with(config(&[]), Arc::new(MemoryStore::new()), universe());
        let err = IndexingService::targeted_index(&state, "TCS.NS", day(5), day(4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_absent_ticker_is_skipped_without_affecting_batch() {
        let store = Arc::new(MemoryStore::new());
        let provider = universe();
        let state = state_with(
            config(&["TCS.NS", "GHOST.NS", "INFY.NS"]),
            store.clone(),
            provider.clone(),
        );

        let summary = IndexingService::incremental_index_at(&state, day(6)).await.unwrap();

        assert_eq!(summary.tickers_processed, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].ticker, "GHOST.NS");
        assert_eq!(summary.skipped[0].code, "FETCH_UNAVAILABLE");
        assert_eq!(store.count("nifty_data"), 10);

        // benchmark once, then two ticker batches
        let calls = provider.calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], vec!["^NSEI".to_string()]);
    }

    #[tokio::test]
    async fn test_benchmark_roc_is_joined_by_date() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(config(&["TCS.NS"]), store.clone(), universe());

        IndexingService::full_index_range(&state, day(1), day(6)).await.unwrap();

        let doc = store.get("nifty_data", "TCS.NS_2024-05-02").unwrap().unwrap();
        // (202 - 200) / 200 * 100
        let roc_benchmark = doc["roc_benchmark"].as_f64().unwrap();
        assert!((roc_benchmark - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_benchmark_gives_zero() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(StubProvider::new(&[(
            "TCS.NS",
            closes(&[100.0, 102.0, 101.0]),
        )]));
        let state = state_with(config(&["TCS.NS"]), store.clone(), provider);

        let summary = IndexingService::full_index_range(&state, day(1), day(3)).await.unwrap();
        assert_eq!(summary.documents_written, 3);

        let doc = store.get("nifty_data", "TCS.NS_2024-05-02").unwrap().unwrap();
        assert_eq!(doc["roc_benchmark"], json!(0.0));
        assert!(doc["roc"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_full_run_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(config(&["TCS.NS", "INFY.NS"]), store.clone(), universe());

        IndexingService::full_index_range(&state, day(1), day(6)).await.unwrap();
        let first = store.get("nifty_data", "INFY.NS_2024-05-06").unwrap();
        IndexingService::full_index_range(&state, day(1), day(6)).await.unwrap();
        let second = store.get("nifty_data", "INFY.NS_2024-05-06").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count("nifty_data"), 12);
    }

    #[tokio::test]
    async fn test_incremental_zero_never_overwrites_stored_values() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(config(&["TCS.NS"]), store.clone(), universe());
        IndexingService::full_index_range(&state, day(1), day(6)).await.unwrap();
        let before = store.get("nifty_data", "TCS.NS_2024-05-03").unwrap().unwrap();
        assert!(before["rsi"].as_f64().unwrap() > 0.0);

        // Only two days of history: RSI/ATR cannot be computed on refresh
        let mut cfg = config(&["TCS.NS"]);
        cfg.lookback_days = 1;
        let state = state_with(cfg, store.clone(), universe());
        IndexingService::incremental_index_at(&state, day(3)).await.unwrap();

        let after = store.get("nifty_data", "TCS.NS_2024-05-03").unwrap().unwrap();
        assert_eq!(after["rsi"], before["rsi"]);
        assert_eq!(after["atr"], before["atr"]);
        assert_eq!(after["close"], before["close"]);
    }

    #[tokio::test]
    async fn test_total_write_failure_is_fatal() {
        let state = state_with(config(&["TCS.NS"]), Arc::new(BrokenStore), universe());
        let err = IndexingService::full_index_range(&state, day(1), day(6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::WriteFailure(_)));
    }

    #[tokio::test]
    async fn test_partial_write_failures_are_counted_and_run_continues() {
        let store = Arc::new(RejectingStore {
            inner: MemoryStore::new(),
            reject: "TCS.NS_2024-05-03".to_string(),
        });
        let state = state_with(config(&["TCS.NS", "INFY.NS"]), store.clone(), universe());

        let summary = IndexingService::full_index_range(&state, day(1), day(6)).await.unwrap();

        assert_eq!(summary.tickers_processed, 2);
        assert_eq!(summary.documents_written, 11);
        assert_eq!(summary.documents_failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].id, "TCS.NS_2024-05-03");
        assert!(summary.skipped.is_empty());

        assert!(store.get("nifty_data", "TCS.NS_2024-05-03").unwrap().is_none());
        assert!(store.get("nifty_data", "TCS.NS_2024-05-04").unwrap().is_some());
        assert!(store.get("nifty_data", "INFY.NS_2024-05-06").unwrap().is_some());
        assert_eq!(store.inner.count("nifty_data"), 11);
    }

    #[tokio::test]
    async fn test_misaligned_ticker_is_skipped_and_batch_mates_written() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(
            StubProvider::new(&[
                ("^NSEI", closes(&[200.0, 202.0, 204.0])),
                ("TCS.NS", closes(&[100.0, 102.0, 101.0])),
                ("INFY.NS", closes(&[50.0, 51.0, 49.0])),
            ])
            .without_close("INFY.NS"),
        );
        let state = state_with(config(&["INFY.NS", "TCS.NS"]), store.clone(), provider.clone());

        let summary = IndexingService::full_index_range(&state, day(1), day(3)).await.unwrap();

        assert_eq!(summary.tickers_processed, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].ticker, "INFY.NS");
        assert_eq!(summary.skipped[0].code, "ALIGNMENT_ERROR");
        assert_eq!(summary.documents_written, 3);

        // both tickers came from one batch request
        assert_eq!(provider.calls.lock().len(), 2);
        assert!(store.get("nifty_data", "TCS.NS_2024-05-02").unwrap().is_some());
        assert!(store.get("nifty_data", "INFY.NS_2024-05-02").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_bootstrap() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(config(&[]), store.clone(), universe());

        assert!(!store.exists("nifty_data").unwrap());
        IndexingService::ensure_index(&state).unwrap();
        assert!(store.exists("nifty_data").unwrap());
        // second call is a no-op
        IndexingService::ensure_index(&state).unwrap();
    }
}
