//! Series normalization
//!
//! Turns a (possibly multi-ticker) batch frame into a strict, date-sorted
//! series for one ticker. This is the only place where loose provider cells
//! are interpreted.

use crate::error::{AppError, Result};
use crate::market::types::{BarDate, PriceBar, Series};
use crate::providers::types::{BatchFrame, Cell, PriceField};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Extract the series for `ticker` from a batch frame.
///
/// A ticker the batch does not contain yields an empty series. `batch` is the
/// chunk number, reported in alignment errors.
pub fn extract_series(frame: &BatchFrame, ticker: &str, batch: usize) -> Result<Series> {
    let column_ticker = if frame.contains_ticker(ticker) {
        Some(ticker)
    } else if frame.is_single_ticker() {
        None
    } else {
        tracing::debug!(ticker, batch, "Ticker not present in batch");
        return Ok(Series::empty(ticker));
    };

    let close = frame
        .column(PriceField::Close, column_ticker)
        .ok_or_else(|| AppError::Alignment {
            batch,
            message: format!("missing Close column for {}", ticker),
        })?;
    let rows = close.len();

    let dates = date_source(frame, column_ticker).ok_or_else(|| AppError::Alignment {
        batch,
        message: format!("no Date column or batch index for {}", ticker),
    })?;
    if dates.len() < rows {
        return Err(AppError::Alignment {
            batch,
            message: format!(
                "date source has {} rows but {} has {}",
                dates.len(),
                ticker,
                rows
            ),
        });
    }

    let open = frame.column(PriceField::Open, column_ticker);
    let high = frame.column(PriceField::High, column_ticker);
    let low = frame.column(PriceField::Low, column_ticker);
    let volume = frame.column(PriceField::Volume, column_ticker);

    // Explicit 0..rows positions keep every field aligned with the date array,
    // which may be the shared batch index rather than the ticker's own column.
    let mut bars: Vec<PriceBar> = (0..rows)
        .map(|i| PriceBar {
            date: parse_date(&dates[i]),
            open: number_at(open, i),
            high: number_at(high, i),
            low: number_at(low, i),
            close: cell_number(&close[i]),
            volume: volume_at(volume, i),
        })
        .filter(|bar| !is_blank_row(bar))
        .collect();

    let invalid = bars.iter().filter(|b| !b.date.is_valid()).count();
    if invalid > 0 {
        tracing::warn!(ticker, batch, invalid, "Rows with unparsable dates excluded from indicators");
    }

    bars.sort_by(|a, b| a.date.cmp(&b.date));
    dedup_last(&mut bars);

    Ok(Series::new(ticker, bars))
}

fn date_source<'a>(frame: &'a BatchFrame, ticker: Option<&str>) -> Option<&'a [Cell]> {
    frame
        .column(PriceField::Date, ticker)
        .or_else(|| frame.column(PriceField::Date, None))
        .or_else(|| (!frame.index.is_empty()).then_some(frame.index.as_slice()))
}

// Rows where every price is missing are padding from the batch layout
// (the ticker did not trade on a date another ticker did).
fn is_blank_row(bar: &PriceBar) -> bool {
    bar.open.is_nan() && bar.high.is_nan() && bar.low.is_nan() && bar.close.is_nan()
}

// Keep the last occurrence of each valid date; input is sorted.
fn dedup_last(bars: &mut Vec<PriceBar>) {
    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars.drain(..) {
        match out.last_mut() {
            Some(prev) if prev.date.is_valid() && prev.date == bar.date => *prev = bar,
            _ => out.push(bar),
        }
    }
    *bars = out;
}

/// Resolve a cell to a float. Lists contribute their first element.
pub fn cell_number(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(v) => *v,
        Cell::List(values) => values.first().copied().unwrap_or(f64::NAN),
        Cell::Text(text) => text.trim().replace(',', "").parse().unwrap_or(f64::NAN),
        Cell::Empty => f64::NAN,
    }
}

fn number_at(column: Option<&[Cell]>, i: usize) -> f64 {
    column
        .and_then(|cells| cells.get(i))
        .map(cell_number)
        .unwrap_or(f64::NAN)
}

fn volume_at(column: Option<&[Cell]>, i: usize) -> Option<u64> {
    let value = number_at(column, i);
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

/// Parse a provider date cell.
///
/// Accepts ISO dates, date-times (the time part is dropped), RFC 3339 and
/// unix timestamps in seconds.
pub fn parse_date(cell: &Cell) -> BarDate {
    let raw = match cell {
        Cell::Text(text) => text.trim().to_string(),
        Cell::Number(secs) => return date_from_timestamp(*secs, cell),
        Cell::List(values) => match values.first() {
            Some(secs) => return date_from_timestamp(*secs, cell),
            None => return BarDate::Invalid(String::new()),
        },
        Cell::Empty => return BarDate::Invalid(String::new()),
    };

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, format) {
            return BarDate::Valid(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, format) {
            return BarDate::Valid(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return BarDate::Valid(dt.date_naive());
    }

    BarDate::Invalid(raw)
}

fn date_from_timestamp(secs: f64, cell: &Cell) -> BarDate {
    if !secs.is_finite() {
        return BarDate::Invalid(format!("{:?}", cell));
    }
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| BarDate::Valid(dt.date_naive()))
        .unwrap_or_else(|| BarDate::Invalid(format!("{:?}", cell)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::ColumnKey;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn two_ticker_frame() -> BatchFrame {
        let index = vec![
            Cell::from("2024-01-03"),
            Cell::from("2024-01-01"),
            Cell::from("2024-01-02"),
        ];
        let mut frame = BatchFrame::new(index);
        for (ticker, base) in [("TCS.NS", 100.0), ("INFY.NS", 50.0)] {
            frame.insert_column(
                ColumnKey::new("Open", ticker),
                vec![Cell::Number(base + 2.0), Cell::Number(base), Cell::Number(base + 1.0)],
            );
            frame.insert_column(
                ColumnKey::new("High", ticker),
                vec![Cell::Number(base + 3.0), Cell::Number(base + 1.0), Cell::Number(base + 2.0)],
            );
            frame.insert_column(
                ColumnKey::new("Low", ticker),
                vec![Cell::Number(base + 1.0), Cell::Number(base - 1.0), Cell::Number(base)],
            );
            frame.insert_column(
                ColumnKey::new("Close", ticker),
                vec![Cell::Number(base + 2.5), Cell::Number(base + 0.5), Cell::Number(base + 1.5)],
            );
            frame.insert_column(
                ColumnKey::new("Volume", ticker),
                vec![Cell::Number(300.0), Cell::Number(100.0), Cell::Number(200.0)],
            );
        }
        frame
    }

    #[test]
    fn test_extracts_sorted_series_from_shared_index() {
        let frame = two_ticker_frame();
        let series = extract_series(&frame, "INFY.NS", 0).unwrap();

        assert_eq!(series.ticker, "INFY.NS");
        assert_eq!(series.len(), 3);
        let dates: Vec<_> = series.bars.iter().map(|b| b.date.valid().unwrap()).collect();
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]);
        assert_eq!(series.bars[0].close, 50.5);
        assert_eq!(series.bars[0].volume, Some(100));
        assert_eq!(series.bars[2].open, 52.0);
    }

    #[test]
    fn test_absent_ticker_returns_empty_series() {
        let frame = two_ticker_frame();
        let series = extract_series(&frame, "WIPRO.NS", 4).unwrap();
        assert!(series.is_empty());

        // Other tickers in the same batch are unaffected
        assert_eq!(extract_series(&frame, "TCS.NS", 4).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_close_is_alignment_error() {
        let frame = BatchFrame::new(vec![Cell::from("2024-01-01")])
            .with_column(ColumnKey::new("Open", "TCS.NS"), vec![Cell::Number(1.0)]);

        match extract_series(&frame, "TCS.NS", 7) {
            Err(AppError::Alignment { batch, .. }) => assert_eq!(batch, 7),
            other => panic!("expected alignment error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_date_source_is_alignment_error() {
        let frame = BatchFrame::default()
            .with_column(ColumnKey::new("Close", "TCS.NS"), vec![Cell::Number(1.0)]);

        assert!(matches!(
            extract_series(&frame, "TCS.NS", 0),
            Err(AppError::Alignment { .. })
        ));
    }

    #[test]
    fn test_single_element_lists_and_flat_names() {
        let mut frame = BatchFrame::default();
        frame.insert_flat("Date", vec![Cell::from("2024-02-01")]);
        frame.insert_flat("Open/SBIN.NS", vec![Cell::List(vec![600.0])]);
        frame.insert_flat("High/SBIN.NS", vec![Cell::List(vec![610.0])]);
        frame.insert_flat("Low/SBIN.NS", vec![Cell::Number(590.0)]);
        frame.insert_flat("Close/SBIN.NS", vec![Cell::List(vec![605.0])]);
        frame.insert_flat("Volume/SBIN.NS", vec![Cell::List(vec![1234.0])]);

        let series = extract_series(&frame, "SBIN.NS", 0).unwrap();
        assert_eq!(series.len(), 1);
        let bar = &series.bars[0];
        assert_eq!(bar.date, BarDate::Valid(date(2024, 2, 1)));
        assert_eq!((bar.open, bar.high, bar.low, bar.close), (600.0, 610.0, 590.0, 605.0));
        assert_eq!(bar.volume, Some(1234));
    }

    #[test]
    fn test_single_ticker_frame_without_ticker_dimension() {
        let frame = BatchFrame::default()
            .with_column(ColumnKey::field_only("Date"), vec![Cell::from("2024-03-01 00:00:00")])
            .with_column(ColumnKey::field_only("Close"), vec![Cell::Number(10.0)]);

        let series = extract_series(&frame, "ANY", 0).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars[0].date, BarDate::Valid(date(2024, 3, 1)));
        assert!(series.bars[0].open.is_nan());
        assert_eq!(series.bars[0].volume, None);
    }

    #[test]
    fn test_invalid_dates_are_kept_as_invalid_and_trail() {
        let frame = BatchFrame::new(vec![Cell::from("garbage"), Cell::from("2024-01-05")])
            .with_column(
                ColumnKey::new("Close", "X"),
                vec![Cell::Number(1.0), Cell::Number(2.0)],
            );

        let series = extract_series(&frame, "X", 0).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.bars[0].date.is_valid());
        assert_eq!(series.bars[1].date, BarDate::Invalid("garbage".into()));
    }

    #[test]
    fn test_duplicate_dates_keep_last() {
        let frame = BatchFrame::new(vec![Cell::from("2024-01-05"), Cell::from("2024-01-05")])
            .with_column(
                ColumnKey::new("Close", "X"),
                vec![Cell::Number(1.0), Cell::Number(2.0)],
            );

        let series = extract_series(&frame, "X", 0).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars[0].close, 2.0);
    }

    #[test]
    fn test_blank_padding_rows_are_dropped() {
        let frame = BatchFrame::new(vec![Cell::from("2024-01-01"), Cell::from("2024-01-02")])
            .with_column(ColumnKey::new("Close", "X"), vec![Cell::Empty, Cell::Number(5.0)]);

        let series = extract_series(&frame, "X", 0).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars[0].close, 5.0);
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date(&Cell::from("2024-06-28")), BarDate::Valid(date(2024, 6, 28)));
        assert_eq!(
            parse_date(&Cell::from("2024-06-28T00:00:00+05:30")),
            BarDate::Valid(date(2024, 6, 28))
        );
        assert_eq!(parse_date(&Cell::Number(1_704_067_200.0)), BarDate::Valid(date(2024, 1, 1)));
        assert!(!parse_date(&Cell::Empty).is_valid());
    }
}
