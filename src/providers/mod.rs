//! Price provider adapters

pub mod types;
pub mod yahoo;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub use types::{BatchFrame, Cell, ColumnKey, PriceField};
pub use yahoo::YahooProvider;

/// Daily OHLCV source
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider ID (e.g., "yahoo")
    fn id(&self) -> &'static str;

    /// Fetch daily bars for `tickers` over `start..=end`.
    ///
    /// `Ok(None)` means the provider has nothing for any requested ticker.
    /// `Ok(Some(frame))` with zero rows means the range held no trading days.
    /// Tickers missing from a returned frame had no data.
    async fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<BatchFrame>>;
}
