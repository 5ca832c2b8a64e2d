//! Document builder
//!
//! Maps enriched rows to store write actions keyed `{ticker}_{date}`.
//!
//! - `Full` replaces the whole document; rows whose `open` is the zero
//!   sentinel are dropped so placeholder dates never become zero-price docs.
//! - `Incremental` only touches the trailing window of rows and only carries
//!   non-sentinel fields, so a late partial bar cannot clobber stored values.

pub mod schema;

use crate::market::types::EnrichedRow;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

pub use schema::{price_index_schema, FieldMapping, FieldType, IndexSchema};

/// Document body / sparse field set
pub type Fields = Map<String, Value>;

/// Default number of trailing rows rewritten by an incremental run
pub const DEFAULT_INCREMENTAL_WINDOW: usize = 5;

/// Caller intent for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Full reindex: replace documents
    Full,
    /// Daily refresh: upsert the last `window` rows field by field
    Incremental { window: usize },
}

impl WriteMode {
    pub fn incremental() -> Self {
        WriteMode::Incremental {
            window: DEFAULT_INCREMENTAL_WINDOW,
        }
    }
}

/// A single bulk write action
#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    /// Create or replace the document with exactly these fields
    Full {
        index: String,
        id: String,
        document: Fields,
    },
    /// Create the document if absent, else merge these fields into it
    Incremental {
        index: String,
        id: String,
        fields: Fields,
    },
}

impl WriteAction {
    pub fn index(&self) -> &str {
        match self {
            WriteAction::Full { index, .. } | WriteAction::Incremental { index, .. } => index,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteAction::Full { id, .. } | WriteAction::Incremental { id, .. } => id,
        }
    }

    pub fn fields(&self) -> &Fields {
        match self {
            WriteAction::Full { document, .. } => document,
            WriteAction::Incremental { fields, .. } => fields,
        }
    }

    pub fn is_replace(&self) -> bool {
        matches!(self, WriteAction::Full { .. })
    }
}

/// Document identity for a (ticker, date) pair
pub fn document_id(ticker: &str, date: NaiveDate) -> String {
    format!("{}_{}", ticker, date.format("%Y-%m-%d"))
}

/// Build the write actions for one ticker's enriched rows
pub fn build_actions(
    index: &str,
    ticker: &str,
    rows: &[EnrichedRow],
    mode: WriteMode,
) -> Vec<WriteAction> {
    let dated: Vec<(NaiveDate, &EnrichedRow)> = rows
        .iter()
        .filter_map(|row| row.date.valid().map(|date| (date, row)))
        .collect();

    match mode {
        WriteMode::Full => dated
            .into_iter()
            .filter(|(_, row)| row.open != 0.0)
            .map(|(date, row)| WriteAction::Full {
                index: index.to_string(),
                id: document_id(ticker, date),
                document: full_document(ticker, date, row),
            })
            .collect(),
        WriteMode::Incremental { window } => {
            let start = dated.len().saturating_sub(window);
            dated[start..]
                .iter()
                .map(|(date, row)| WriteAction::Incremental {
                    index: index.to_string(),
                    id: document_id(ticker, *date),
                    fields: sparse_fields(ticker, *date, row),
                })
                .collect()
        }
    }
}

fn full_document(ticker: &str, date: NaiveDate, row: &EnrichedRow) -> Fields {
    let value = json!({
        "ticker": ticker,
        "date": date.format("%Y-%m-%d").to_string(),
        "open": row.open,
        "close": row.close,
        "high": row.high,
        "low": row.low,
        "volume": row.volume,
        "rsi": row.rsi,
        "roc": row.roc,
        "roc_benchmark": row.roc_benchmark,
        "atr": row.atr,
    });

    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn sparse_fields(ticker: &str, date: NaiveDate, row: &EnrichedRow) -> Fields {
    let mut fields = Fields::new();
    fields.insert("ticker".into(), json!(ticker));
    fields.insert("date".into(), json!(date.format("%Y-%m-%d").to_string()));

    let floats = [
        ("open", row.open),
        ("close", row.close),
        ("high", row.high),
        ("low", row.low),
        ("rsi", row.rsi),
        ("roc", row.roc),
        ("roc_benchmark", row.roc_benchmark),
        ("atr", row.atr),
    ];
    for (name, value) in floats {
        if value != 0.0 && value.is_finite() {
            fields.insert(name.into(), json!(value));
        }
    }
    if row.volume != 0 {
        fields.insert("volume".into(), json!(row.volume));
    }

    fields
}
