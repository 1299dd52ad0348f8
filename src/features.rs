//! Feature derivation
//!
//! This module derives per-row features from a cleaned sleep table:
//! - Bed/wake timestamps
//! - Sleep efficiency and sleep debt
//! - Bedtime regularity (shift from the previous row)
//! - Day of week

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::types::{DerivedFeatures, SleepRecord, SleepTable};

/// Reference sleep need (hours) used for sleep debt
pub const TARGET_SLEEP_HOURS: f64 = 8.0;

/// Feature deriver for sleep tables
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Derive features for every row, in table order.
    ///
    /// `bedtime_shift` compares each row with the row before it, so the table
    /// should already be sorted by date. The first row has no predecessor and
    /// its shift is left missing.
    pub fn derive(table: SleepTable) -> SleepTable {
        let mut previous_bedtime: Option<Option<f64>> = None;

        let (records, raw_columns) = table.into_parts();
        let records = records
            .into_iter()
            .map(|record| {
                let obs = &record.observation;
                let bedtime_shift = match previous_bedtime {
                    Some(prev) => compute_bedtime_shift(prev, obs.bedtime),
                    None => None,
                };
                previous_bedtime = Some(obs.bedtime);

                let features = DerivedFeatures {
                    bedtime_datetime: compute_timestamp(obs.date, obs.bedtime),
                    wake_time_datetime: compute_timestamp(obs.date, obs.wake_time),
                    sleep_efficiency: compute_sleep_efficiency(
                        obs.deep_sleep_pct,
                        obs.rem_sleep_pct,
                    ),
                    bedtime_shift,
                    sleep_debt: compute_sleep_debt(obs.sleep_duration),
                    day_of_week: obs.date.weekday().num_days_from_monday(),
                };

                SleepRecord {
                    features: Some(features),
                    ..record
                }
            })
            .collect();

        SleepTable::from_parts(records, raw_columns)
    }
}

/// Combine a calendar date with an hour-of-day offset
fn compute_timestamp(date: NaiveDate, hours: Option<f64>) -> Option<NaiveDateTime> {
    let hours = hours?;
    if !hours.is_finite() {
        return None;
    }
    let offset = Duration::try_milliseconds((hours * 3_600_000.0).round() as i64)?;
    date.and_hms_opt(0, 0, 0)?.checked_add_signed(offset)
}

/// Sleep efficiency: deep sleep plus half of REM, as a fraction
fn compute_sleep_efficiency(deep_pct: Option<f64>, rem_pct: Option<f64>) -> Option<f64> {
    Some((deep_pct? + 0.5 * rem_pct?) / 100.0)
}

/// Absolute change in bedtime from the previous row
fn compute_bedtime_shift(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    Some((current? - previous?).abs())
}

/// Hours short of the reference sleep need (negative when oversleeping)
fn compute_sleep_debt(sleep_duration: Option<f64>) -> Option<f64> {
    Some(TARGET_SLEEP_HOURS - sleep_duration?)
}

/// Derive features on a table
pub fn engineer_features(table: SleepTable) -> SleepTable {
    FeatureDeriver::derive(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::observation;
    use crate::types::Column;
    use chrono::NaiveTime;
    use pretty_assertions::assert_eq;

    fn make_table() -> SleepTable {
        let mut first = observation("2025-01-06", 7.0, 80.0);
        first.bedtime = Some(22.5);
        let mut second = observation("2025-01-07", 9.0, 70.0);
        second.bedtime = Some(23.25);
        let mut third = observation("2025-01-12", 6.0, 60.0);
        third.bedtime = Some(21.0);
        SleepTable::from_observations(vec![first, second, third])
    }

    #[test]
    fn test_first_row_shift_is_missing() {
        let derived = engineer_features(make_table());
        let shifts = derived.column(Column::BedtimeShift, "test").unwrap();

        assert_eq!(shifts, vec![None, Some(0.75), Some(2.25)]);
    }

    #[test]
    fn test_sleep_efficiency_and_debt() {
        let derived = engineer_features(make_table());
        let features = derived.records()[1].features.as_ref().unwrap();

        // (20 + 0.5 * 25) / 100
        assert!((features.sleep_efficiency.unwrap() - 0.325).abs() < 1e-12);
        assert_eq!(features.sleep_debt, Some(-1.0));
    }

    #[test]
    fn test_day_of_week_monday_based() {
        let derived = engineer_features(make_table());
        let days: Vec<u32> = derived
            .records()
            .iter()
            .map(|r| r.features.as_ref().unwrap().day_of_week)
            .collect();

        // 2025-01-06 is a Monday, 2025-01-12 a Sunday
        assert_eq!(days, vec![0, 1, 6]);
    }

    #[test]
    fn test_bedtime_timestamp() {
        let derived = engineer_features(make_table());
        let features = derived.records()[0].features.as_ref().unwrap();
        let expected = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(22, 30, 0).unwrap());

        assert_eq!(features.bedtime_datetime, Some(expected));
    }

    #[test]
    fn test_missing_inputs_propagate() {
        let mut obs = observation("2025-01-06", 7.0, 80.0);
        obs.deep_sleep_pct = None;
        obs.sleep_duration = None;
        obs.bedtime = None;
        let derived = engineer_features(SleepTable::from_observations(vec![
            obs,
            observation("2025-01-07", 7.0, 80.0),
        ]));
        let first = derived.records()[0].features.as_ref().unwrap();
        let second = derived.records()[1].features.as_ref().unwrap();

        assert_eq!(first.sleep_efficiency, None);
        assert_eq!(first.sleep_debt, None);
        assert_eq!(first.bedtime_datetime, None);
        // Predecessor bedtime is missing, so the shift is too
        assert_eq!(second.bedtime_shift, None);
    }

    #[test]
    fn test_features_make_derived_columns_available() {
        let table = make_table();
        assert!(!table.has_features());
        let derived = engineer_features(table);
        assert!(derived.has_features());
        assert_eq!(derived.columns().len(), Column::all().count());
    }
}
