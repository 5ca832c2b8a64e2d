//! Conversion of parsed statements into document parts

use crate::fundamentals::types::{NamedValue, QuarterlyEntry, QuarterlyTable, StatementValue};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Ratios kept in the snapshot, after key normalization
const ALLOWED_RATIOS: [&str; 6] = ["roe", "roce", "book_value", "dividend_yield", "eps", "eps_in_rs"];

/// Peer-sector breadcrumb categories kept in the snapshot
const SECTOR_CATEGORIES: [&str; 4] = ["broad_sector", "sector", "industry_group", "industry"];

/// Clean a metric label: non-breaking spaces, expander `+` markers, padding
pub fn clean_metric(raw: &str) -> String {
    raw.replace('\u{a0}', " ").replace('+', "").trim().to_string()
}

/// `"Dividend Yield"` -> `"dividend_yield"`
pub fn snake_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Parse a period header such as `"Mar 2024"` to the first of that month
pub fn parse_period(header: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("01 {}", header.trim()), "%d %b %Y").ok()
}

fn statement_number(value: &StatementValue) -> Option<f64> {
    let number = match value {
        StatementValue::Number(v) => *v,
        StatementValue::Text(text) => {
            let cleaned = text.replace('%', "").replace(',', "");
            cleaned.trim().parse::<f64>().ok()?
        }
    };
    number.is_finite().then_some(number)
}

/// Flatten the quarterly table into one entry per (metric, period) cell.
///
/// Empty or non-numeric cells are skipped, as are columns whose header is not
/// a `Mon YYYY` period.
pub fn quarterly_entries(table: &QuarterlyTable) -> Vec<QuarterlyEntry> {
    let periods: Vec<Option<NaiveDate>> = table
        .periods
        .iter()
        .map(|header| {
            let parsed = parse_period(header);
            if parsed.is_none() {
                tracing::warn!(header = %header, "Skipping unparsable quarterly period");
            }
            parsed
        })
        .collect();

    let mut entries = Vec::new();
    for row in &table.rows {
        let metric = clean_metric(&row.metric);
        for (cell, period) in row.values.iter().zip(&periods) {
            let (Some(cell), Some(period)) = (cell, period) else {
                continue;
            };
            let Some(value) = statement_number(cell) else {
                continue;
            };
            entries.push(QuarterlyEntry {
                metric: metric.clone(),
                period_date: period.format("%Y-%m").to_string(),
                period_label: period.format("%Y-%B").to_string(),
                value,
            });
        }
    }
    entries
}

/// Ratio snapshot restricted to [`ALLOWED_RATIOS`]
pub fn ratios_snapshot(ratios: &[NamedValue]) -> BTreeMap<String, f64> {
    ratios
        .iter()
        .filter_map(|ratio| {
            let key = snake_key(&ratio.name);
            if !ALLOWED_RATIOS.contains(&key.as_str()) {
                return None;
            }
            let value = statement_number(&StatementValue::Text(ratio.value.clone()))?;
            Some((key, value))
        })
        .collect()
}

/// Sector snapshot keyed by snake-cased category
pub fn sector_snapshot(sector: &[NamedValue]) -> BTreeMap<String, String> {
    sector
        .iter()
        .map(|entry| (snake_key(&entry.name), entry.value.trim().to_string()))
        .filter(|(key, value)| SECTOR_CATEGORIES.contains(&key.as_str()) && !value.is_empty())
        .collect()
}
