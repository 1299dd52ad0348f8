//! Data quality checks
//!
//! Produces a point-in-time snapshot of table health. The report is not
//! updated if the table changes afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::stats;
use crate::types::{Column, ColumnKind, SleepTable};

/// Observed range of a numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// Snapshot of data-health metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Missing cells per present column
    pub missing_values: BTreeMap<Column, usize>,
    /// Observed min/max per numeric column; `None` when the column has no values
    pub value_ranges: BTreeMap<Column, Option<ValueRange>>,
    /// Number of rows
    pub record_count: usize,
    /// Data-type label per present column
    pub data_types: BTreeMap<Column, ColumnKind>,
}

impl QualityReport {
    /// Total number of missing cells across all columns
    pub fn total_missing(&self) -> usize {
        self.missing_values.values().sum()
    }
}

/// Compute the quality report over the current table state
pub fn perform_quality_checks(table: &SleepTable) -> QualityReport {
    let columns = table.columns();

    let missing_values = columns
        .iter()
        .map(|&column| {
            let missing = table
                .records()
                .iter()
                .filter(|r| r.is_missing(column))
                .count();
            (column, missing)
        })
        .collect();

    let value_ranges = columns
        .iter()
        .filter(|c| c.kind().is_numeric())
        .map(|&column| {
            let values: Vec<f64> = table
                .records()
                .iter()
                .filter_map(|r| r.value(column))
                .collect();
            let range = match (stats::min(&values), stats::max(&values)) {
                (Some(min), Some(max)) => Some(ValueRange { min, max }),
                _ => None,
            };
            (column, range)
        })
        .collect();

    let data_types = columns.iter().map(|&c| (c, c.kind())).collect();

    QualityReport {
        missing_values,
        value_ranges,
        record_count: table.len(),
        data_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::engineer_features;
    use crate::types::test_support::observation;
    use pretty_assertions::assert_eq;

    fn make_table() -> SleepTable {
        let mut second = observation("2025-01-02", 5.0, 90.0);
        second.heart_rate = None;
        SleepTable::from_observations(vec![
            observation("2025-01-01", 7.0, 60.0),
            second,
            observation("2025-01-03", 9.0, 75.0),
        ])
    }

    #[test]
    fn test_raw_table_report() {
        let report = perform_quality_checks(&make_table());

        assert_eq!(report.record_count, 3);
        assert_eq!(report.missing_values.len(), Column::RAW.len());
        assert_eq!(report.missing_values[&Column::HeartRate], 1);
        assert_eq!(report.total_missing(), 1);
        assert_eq!(
            report.value_ranges[&Column::SleepDuration],
            Some(ValueRange { min: 5.0, max: 9.0 })
        );
        assert!(!report.value_ranges.contains_key(&Column::Date));
        assert_eq!(report.data_types[&Column::Date], ColumnKind::Date);
    }

    #[test]
    fn test_engineered_table_counts_first_shift_missing() {
        let report = perform_quality_checks(&engineer_features(make_table()));

        assert_eq!(report.missing_values[&Column::BedtimeShift], 1);
        assert_eq!(report.data_types[&Column::DayOfWeek], ColumnKind::Integer);
        assert_eq!(
            report.data_types[&Column::BedtimeDatetime],
            ColumnKind::DateTime
        );
        assert_eq!(
            report.value_ranges[&Column::DayOfWeek],
            Some(ValueRange { min: 2.0, max: 4.0 })
        );
    }

    #[test]
    fn test_report_serializes_with_column_names() {
        let report = perform_quality_checks(&make_table());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["missing_values"]["heart_rate"], 1);
        assert_eq!(json["data_types"]["sleep_duration"], "float");
    }
}
