//! Common price provider types

use serde::{Deserialize, Serialize};

/// Price fields carried by a batch frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    /// Column name as emitted by the provider
    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Date => "Date",
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Volume => "Volume",
        }
    }

    fn matches(self, name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(name.trim())
    }
}

/// A raw cell of a batch frame.
///
/// Providers are loose about cell shapes: the same field can come back as a
/// scalar, a one-element list, text or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    List(Vec<f64>),
    Text(String),
    Empty,
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// Column address: `(field, ticker)` for multi-ticker batches, ticker-less for
/// single-ticker frames
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub field: String,
    pub ticker: Option<String>,
}

impl ColumnKey {
    pub fn new(field: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ticker: Some(ticker.into()),
        }
    }

    pub fn field_only(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ticker: None,
        }
    }

    /// Parse a flat column name such as `Close/TCS.NS`
    pub fn parse(name: &str) -> Self {
        match name.split_once('/') {
            Some((field, ticker)) if !ticker.trim().is_empty() => {
                Self::new(field.trim(), ticker.trim())
            }
            _ => Self::field_only(name.trim()),
        }
    }
}

/// Raw price frame as returned by a provider, possibly covering many tickers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFrame {
    /// Shared batch-level date index
    pub index: Vec<Cell>,
    columns: Vec<(ColumnKey, Vec<Cell>)>,
}

impl BatchFrame {
    pub fn new(index: Vec<Cell>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// Builder-style column insert
    pub fn with_column(mut self, key: ColumnKey, cells: Vec<Cell>) -> Self {
        self.insert_column(key, cells);
        self
    }

    /// Insert or replace a column
    pub fn insert_column(&mut self, key: ColumnKey, cells: Vec<Cell>) {
        if let Some(slot) = self.columns.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = cells;
        } else {
            self.columns.push((key, cells));
        }
    }

    /// Insert a column addressed by a flat `field/ticker` name
    pub fn insert_flat(&mut self, name: &str, cells: Vec<Cell>) {
        self.insert_column(ColumnKey::parse(name), cells);
    }

    /// Look up a column by field and ticker (field match is case-insensitive)
    pub fn column(&self, field: PriceField, ticker: Option<&str>) -> Option<&[Cell]> {
        self.columns
            .iter()
            .find(|(key, _)| field.matches(&key.field) && key.ticker.as_deref() == ticker)
            .map(|(_, cells)| cells.as_slice())
    }

    /// Distinct tickers present in the frame, in column order
    pub fn tickers(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (key, _) in &self.columns {
            if let Some(ticker) = &key.ticker {
                if !out.contains(ticker) {
                    out.push(ticker.clone());
                }
            }
        }
        out
    }

    /// Whether any column carries the ticker dimension for `ticker`
    pub fn contains_ticker(&self, ticker: &str) -> bool {
        self.columns
            .iter()
            .any(|(key, _)| key.ticker.as_deref() == Some(ticker))
    }

    /// Whether the frame has no ticker dimension at all
    pub fn is_single_ticker(&self) -> bool {
        !self.columns.is_empty() && self.columns.iter().all(|(key, _)| key.ticker.is_none())
    }

    pub fn row_count(&self) -> usize {
        self.columns
            .iter()
            .map(|(_, cells)| cells.len())
            .chain(std::iter::once(self.index.len()))
            .max()
            .unwrap_or(0)
    }

    /// No trading days in range
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}
