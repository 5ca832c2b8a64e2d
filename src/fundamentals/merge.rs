//! Quarterly history merge

use crate::fundamentals::types::QuarterlyEntry;
use std::collections::HashMap;

/// Merge stored quarterly history with freshly parsed entries.
///
/// Entries are keyed by `(metric, period_date)`: new entries replace old ones
/// with the same key, unmatched old entries survive, unmatched new entries are
/// appended. The result is sorted by `period_date`; the sort is stable, so
/// entries of one period keep first-seen order.
pub fn merge_quarterly(
    existing: Option<&[QuarterlyEntry]>,
    fresh: Vec<QuarterlyEntry>,
) -> Vec<QuarterlyEntry> {
    let old = existing.unwrap_or_default();
    let mut merged: Vec<QuarterlyEntry> = Vec::with_capacity(old.len() + fresh.len());
    let mut slots: HashMap<(String, String), usize> = HashMap::new();

    for entry in old.iter().cloned().chain(fresh) {
        let (metric, period_date) = entry.key();
        let key = (metric.to_string(), period_date.to_string());
        match slots.get(&key) {
            Some(&slot) => merged[slot] = entry,
            None => {
                slots.insert(key, merged.len());
                merged.push(entry);
            }
        }
    }

    merged.sort_by(|a, b| a.period_date.cmp(&b.period_date));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(metric: &str, period: &str, value: f64) -> QuarterlyEntry {
        QuarterlyEntry {
            metric: metric.into(),
            period_date: period.into(),
            period_label: period.into(),
            value,
        }
    }

    #[test]
    fn test_new_values_win_and_result_is_sorted() {
        let existing = vec![entry("Sales", "2024-03", 100.0)];
        let fresh = vec![entry("Sales", "2024-03", 110.0), entry("Sales", "2024-06", 120.0)];

        let merged = merge_quarterly(Some(&existing), fresh);
        assert_eq!(
            merged,
            vec![entry("Sales", "2024-03", 110.0), entry("Sales", "2024-06", 120.0)]
        );
    }

    #[test]
    fn test_old_history_is_preserved() {
        let existing = vec![entry("Sales", "2023-12", 90.0), entry("Net Profit", "2024-03", 9.0)];
        let fresh = vec![entry("Sales", "2024-03", 100.0)];

        let merged = merge_quarterly(Some(&existing), fresh);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], entry("Sales", "2023-12", 90.0));
        // same period: first-seen order
        assert_eq!(merged[1].metric, "Net Profit");
        assert_eq!(merged[2].metric, "Sales");
    }

    #[test]
    fn test_no_existing_document() {
        let fresh = vec![entry("EPS", "2024-06", 2.0), entry("EPS", "2024-03", 1.5)];
        let merged = merge_quarterly(None, fresh);
        assert_eq!(merged[0].period_date, "2024-03");
        assert_eq!(merged[1].period_date, "2024-06");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fresh = vec![entry("Sales", "2024-03", 110.0)];
        let once = merge_quarterly(None, fresh.clone());
        let twice = merge_quarterly(Some(&once), fresh);
        assert_eq!(once, twice);
    }
}
