//! Price series and indicator row types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Trading date of a bar.
///
/// Unparsable provider dates are kept as `Invalid` so the row can be excluded
/// from lookback windows and from the document stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarDate {
    Valid(NaiveDate),
    Invalid(String),
}

impl BarDate {
    pub fn valid(&self) -> Option<NaiveDate> {
        match self {
            BarDate::Valid(date) => Some(*date),
            BarDate::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, BarDate::Valid(_))
    }
}

impl PartialOrd for BarDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BarDate {
    // Valid dates ascending, invalid rows trail in their original order.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (BarDate::Valid(a), BarDate::Valid(b)) => a.cmp(b),
            (BarDate::Valid(_), BarDate::Invalid(_)) => Ordering::Less,
            (BarDate::Invalid(_), BarDate::Valid(_)) => Ordering::Greater,
            (BarDate::Invalid(_), BarDate::Invalid(_)) => Ordering::Equal,
        }
    }
}

/// Daily OHLCV bar. Missing prices are NaN until the sentinel fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: BarDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date: BarDate::Valid(date),
            open,
            high,
            low,
            close,
            volume: Some(volume),
        }
    }
}

/// Date-sorted bars for one ticker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl Series {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn empty(ticker: impl Into<String>) -> Self {
        Self::new(ticker, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars with a valid date, in order
    pub fn valid_bars(&self) -> impl Iterator<Item = &PriceBar> {
        self.bars.iter().filter(|bar| bar.date.is_valid())
    }
}

/// A bar with derived indicators. `None` means "not computable".
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub bar: PriceBar,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub roc: Option<f64>,
    pub roc_benchmark: Option<f64>,
}

impl IndicatorRow {
    pub fn bare(bar: PriceBar) -> Self {
        Self {
            bar,
            rsi: None,
            atr: None,
            roc: None,
            roc_benchmark: None,
        }
    }
}

/// Indicator row after the terminal sentinel fill: zero stands for missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub date: BarDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub rsi: f64,
    pub atr: f64,
    pub roc: f64,
    pub roc_benchmark: f64,
}
