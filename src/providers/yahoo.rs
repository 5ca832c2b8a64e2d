//! Yahoo Finance chart API adapter

use crate::error::{AppError, Result};
use crate::providers::types::{BatchFrame, Cell, ColumnKey, PriceField};
use crate::providers::PriceProvider;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance daily bars
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        // period2 is exclusive
        let period1 = start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
        let period2 = (end + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc().timestamp())
            .unwrap_or(period1);

        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            urlencoding::encode(ticker),
            period1,
            period2
        )
    }

    /// Fetch one ticker's chart; `Ok(None)` when Yahoo has no data for it
    async fn fetch_chart(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<ChartResult>> {
        let response = self
            .client
            .get(self.chart_url(ticker, start, end))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "Chart request for {} failed with status {}",
                ticker, status
            )));
        }

        let envelope: ChartEnvelope = response.json().await?;
        parse_chart(ticker, envelope)
    }
}

fn parse_chart(ticker: &str, envelope: ChartEnvelope) -> Result<Option<ChartResult>> {
    if let Some(error) = envelope.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(None);
        }
        return Err(AppError::Provider(format!(
            "{}: {} {}",
            ticker,
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    Ok(envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next()))
}

/// Add one ticker's chart to the frame as `(field, ticker)` columns
fn append_chart(frame: &mut BatchFrame, ticker: &str, chart: ChartResult) {
    let dates: Vec<Cell> = chart
        .timestamp
        .iter()
        .map(|ts| match DateTime::from_timestamp(ts + chart.meta.gmtoffset, 0) {
            Some(dt) => Cell::Text(dt.date_naive().format("%Y-%m-%d").to_string()),
            None => Cell::Empty,
        })
        .collect();

    let quote = chart.indicators.quote.into_iter().next().unwrap_or_default();
    let to_cells = |values: Vec<Option<f64>>| values.into_iter().map(Cell::from).collect::<Vec<_>>();

    frame.insert_column(ColumnKey::new(PriceField::Date.as_str(), ticker), dates);
    frame.insert_column(ColumnKey::new(PriceField::Open.as_str(), ticker), to_cells(quote.open));
    frame.insert_column(ColumnKey::new(PriceField::High.as_str(), ticker), to_cells(quote.high));
    frame.insert_column(ColumnKey::new(PriceField::Low.as_str(), ticker), to_cells(quote.low));
    frame.insert_column(ColumnKey::new(PriceField::Close.as_str(), ticker), to_cells(quote.close));
    frame.insert_column(
        ColumnKey::new(PriceField::Volume.as_str(), ticker),
        to_cells(quote.volume),
    );
}

#[async_trait]
impl PriceProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<BatchFrame>> {
        let mut frame = BatchFrame::default();
        let mut last_error: Option<AppError> = None;

        for ticker in tickers {
            match self.fetch_chart(ticker, start, end).await {
                Ok(Some(chart)) => append_chart(&mut frame, ticker, chart),
                Ok(None) => tracing::warn!("YahooProvider::fetch - no data for {}", ticker),
                Err(e) => {
                    tracing::warn!("YahooProvider::fetch - {} failed: {}", ticker, e);
                    last_error = Some(e);
                }
            }
        }

        if frame.tickers().is_empty() {
            return match last_error {
                Some(e) => Err(AppError::FetchUnavailable(e.to_string())),
                None => Ok(None),
            };
        }

        Ok(Some(frame))
    }
}
