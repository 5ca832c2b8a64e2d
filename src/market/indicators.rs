//! Indicator engine
//!
//! Pure functions over a date-sorted series. Every indicator uses simple
//! (unweighted) rolling windows; a window containing a NaN, or a row without a
//! full trailing window, yields `None`. Rows with an invalid date are skipped
//! by the windows and always get `None`.
//!
//! [`fill_sentinels`] is the single place where `None`/NaN become `0.0`.

use crate::market::types::{EnrichedRow, IndicatorRow, PriceBar, Series};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Window lengths for the indicator engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub roc_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            atr_period: 14,
            roc_period: 1,
        }
    }
}

/// Relative Strength Index over `closes`.
///
/// Defined from position `period` on. A window with no losses is pinned to 100.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut gains = vec![f64::NAN; closes.len()];
    let mut losses = vec![f64::NAN; closes.len()];
    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        gains[i] = if change.is_nan() { f64::NAN } else { change.max(0.0) };
        losses[i] = if change.is_nan() { f64::NAN } else { (-change).max(0.0) };
    }

    for i in period..closes.len() {
        let (Some(avg_gain), Some(avg_loss)) = (
            window_mean(&gains[i + 1 - period..=i]),
            window_mean(&losses[i + 1 - period..=i]),
        ) else {
            continue;
        };

        out[i] = Some(if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        });
    }

    out
}

/// Average True Range over `bars`, defined from position `period - 1` on.
pub fn calculate_atr(bars: &[&PriceBar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let true_ranges: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            if i == 0 {
                return range;
            }
            let prev_close = bars[i - 1].close;
            // f64::max ignores NaN; a missing input leaves the true range undefined.
            if range.is_nan() || prev_close.is_nan() {
                return f64::NAN;
            }
            range
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect();

    for i in (period - 1)..bars.len() {
        out[i] = window_mean(&true_ranges[i + 1 - period..=i]);
    }

    out
}

/// Rate of change in percent, defined from position `period` on.
pub fn calculate_roc(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 {
        return out;
    }

    for i in period..closes.len() {
        let base = closes[i - period];
        let current = closes[i];
        if base == 0.0 || !base.is_finite() || !current.is_finite() {
            continue;
        }
        out[i] = Some((current - base) / base * 100.0);
    }

    out
}

/// Benchmark ROC keyed by date, for the left join in [`enrich`]
pub fn benchmark_roc(benchmark: &Series, period: usize) -> HashMap<NaiveDate, f64> {
    let valid: Vec<&PriceBar> = benchmark.valid_bars().collect();
    let closes: Vec<f64> = valid.iter().map(|bar| bar.close).collect();

    valid
        .iter()
        .zip(calculate_roc(&closes, period))
        .filter_map(|(bar, roc)| Some((bar.date.valid()?, roc?)))
        .collect()
}

/// Compute every indicator for `series`.
///
/// Output has one row per input bar, in input order.
pub fn enrich(
    series: &Series,
    config: &IndicatorConfig,
    benchmark: Option<&HashMap<NaiveDate, f64>>,
) -> Vec<IndicatorRow> {
    let positions: Vec<usize> = series
        .bars
        .iter()
        .enumerate()
        .filter(|(_, bar)| bar.date.is_valid())
        .map(|(i, _)| i)
        .collect();
    let valid: Vec<&PriceBar> = positions.iter().map(|&i| &series.bars[i]).collect();
    let closes: Vec<f64> = valid.iter().map(|bar| bar.close).collect();

    let rsi = calculate_rsi(&closes, config.rsi_period);
    let atr = calculate_atr(&valid, config.atr_period);
    let roc = calculate_roc(&closes, config.roc_period);

    let mut rows: Vec<IndicatorRow> = series.bars.iter().cloned().map(IndicatorRow::bare).collect();
    for (k, &i) in positions.iter().enumerate() {
        let row = &mut rows[i];
        row.rsi = rsi[k];
        row.atr = atr[k];
        row.roc = roc[k];
        row.roc_benchmark = match (benchmark, row.bar.date.valid()) {
            (Some(map), Some(date)) => map.get(&date).copied(),
            _ => None,
        };
    }

    rows
}

/// Replace every missing value with its zero sentinel.
///
/// After this step zero means "missing or not yet computable".
pub fn fill_sentinels(rows: Vec<IndicatorRow>) -> Vec<EnrichedRow> {
    rows.into_iter()
        .map(|row| EnrichedRow {
            date: row.bar.date,
            open: zero_if_missing(Some(row.bar.open)),
            high: zero_if_missing(Some(row.bar.high)),
            low: zero_if_missing(Some(row.bar.low)),
            close: zero_if_missing(Some(row.bar.close)),
            volume: row.bar.volume.unwrap_or(0),
            rsi: zero_if_missing(row.rsi),
            atr: zero_if_missing(row.atr),
            roc: zero_if_missing(row.roc),
            roc_benchmark: zero_if_missing(row.roc_benchmark),
        })
        .collect()
}

fn zero_if_missing(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn window_mean(window: &[f64]) -> Option<f64> {
    if window.is_empty() || window.iter().any(|v| v.is_nan()) {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}
