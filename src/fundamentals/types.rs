//! Fundamentals data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw statement cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatementValue {
    Number(f64),
    Text(String),
}

/// One metric row of the quarterly results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyRow {
    pub metric: String,
    /// One cell per entry of [`QuarterlyTable::periods`]
    pub values: Vec<Option<StatementValue>>,
}

/// Quarterly results table as parsed from a company statement page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyTable {
    /// Column headers such as `"Mar 2024"`
    pub periods: Vec<String>,
    pub rows: Vec<QuarterlyRow>,
}

/// Name/value pair from the ratio list or the peer-sector breadcrumb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: String,
}

/// Parsed statements for one company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalData {
    pub quarterly: QuarterlyTable,
    #[serde(default)]
    pub ratios: Vec<NamedValue>,
    #[serde(default)]
    pub sector: Vec<NamedValue>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// A single quarterly fact, unique by `(metric, period_date)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyEntry {
    pub metric: String,
    /// `YYYY-MM`
    pub period_date: String,
    /// `YYYY-Month`
    pub period_label: String,
    pub value: f64,
}

impl QuarterlyEntry {
    pub fn key(&self) -> (&str, &str) {
        (&self.metric, &self.period_date)
    }
}

/// Persisted per-ticker fundamentals document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalDocument {
    pub ticker: String,
    pub market_cap: Option<f64>,
    /// Latest sector classification, replaced on every write
    #[serde(default)]
    pub sector: BTreeMap<String, String>,
    /// Latest ratios, replaced on every write
    #[serde(default)]
    pub ratios: BTreeMap<String, f64>,
    /// Quarterly history, merged across writes
    #[serde(default)]
    pub quarterly: Vec<QuarterlyEntry>,
}
