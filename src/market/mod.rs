//! Market data: typed price series, normalization and indicators

pub mod indicators;
pub mod normalizer;
pub mod types;

pub use indicators::{
    benchmark_roc, calculate_atr, calculate_roc, calculate_rsi, enrich, fill_sentinels,
    IndicatorConfig,
};
pub use normalizer::extract_series;
pub use types::{BarDate, EnrichedRow, IndicatorRow, PriceBar, Series};
