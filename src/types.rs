//! Core types for the Sleep Flux pipeline
//!
//! This module defines the tabular data that flows through each stage of the
//! pipeline: raw observations, derived features, and the table that owns them.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

/// Data-type label of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Date,
    DateTime,
    Float,
    Integer,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Date => "date",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Float => "float",
            ColumnKind::Integer => "integer",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Float | ColumnKind::Integer)
    }
}

/// Every column a sleep table can carry, raw columns first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    SleepDuration,
    QualityScore,
    Bedtime,
    WakeTime,
    ActivityLevel,
    StressLevel,
    HeartRate,
    DeepSleepPct,
    RemSleepPct,
    LightSleepPct,
    BedtimeDatetime,
    WakeTimeDatetime,
    SleepEfficiency,
    BedtimeShift,
    SleepDebt,
    DayOfWeek,
}

impl Column {
    /// Columns present on every observation
    pub const RAW: [Column; 11] = [
        Column::Date,
        Column::SleepDuration,
        Column::QualityScore,
        Column::Bedtime,
        Column::WakeTime,
        Column::ActivityLevel,
        Column::StressLevel,
        Column::HeartRate,
        Column::DeepSleepPct,
        Column::RemSleepPct,
        Column::LightSleepPct,
    ];

    /// Columns added by feature engineering, in derivation order
    pub const DERIVED: [Column; 6] = [
        Column::BedtimeDatetime,
        Column::WakeTimeDatetime,
        Column::SleepEfficiency,
        Column::BedtimeShift,
        Column::SleepDebt,
        Column::DayOfWeek,
    ];

    pub fn all() -> impl Iterator<Item = Column> {
        Self::RAW.into_iter().chain(Self::DERIVED)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::SleepDuration => "sleep_duration",
            Column::QualityScore => "quality_score",
            Column::Bedtime => "bedtime",
            Column::WakeTime => "wake_time",
            Column::ActivityLevel => "activity_level",
            Column::StressLevel => "stress_level",
            Column::HeartRate => "heart_rate",
            Column::DeepSleepPct => "deep_sleep_pct",
            Column::RemSleepPct => "rem_sleep_pct",
            Column::LightSleepPct => "light_sleep_pct",
            Column::BedtimeDatetime => "bedtime_datetime",
            Column::WakeTimeDatetime => "wake_time_datetime",
            Column::SleepEfficiency => "sleep_efficiency",
            Column::BedtimeShift => "bedtime_shift",
            Column::SleepDebt => "sleep_debt",
            Column::DayOfWeek => "day_of_week",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Date => ColumnKind::Date,
            Column::BedtimeDatetime | Column::WakeTimeDatetime => ColumnKind::DateTime,
            Column::DayOfWeek => ColumnKind::Integer,
            _ => ColumnKind::Float,
        }
    }

    pub fn is_derived(&self) -> bool {
        Self::DERIVED.contains(self)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::all()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown column '{s}'"))
    }
}

/// One subject-day sleep record as generated or loaded
///
/// Measurement fields are optional: loaded data may carry empty cells, and the
/// pipeline never fills them with placeholder values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar date of the record
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    /// Total sleep (hours)
    pub sleep_duration: Option<f64>,
    /// Sleep quality score (0-100)
    pub quality_score: Option<f64>,
    /// Hour of day the subject went to bed [0, 24)
    pub bedtime: Option<f64>,
    /// Hour of day the subject woke up [0, 24)
    pub wake_time: Option<f64>,
    /// Daily activity level (0-120)
    pub activity_level: Option<f64>,
    /// Self-reported stress (0-10)
    pub stress_level: Option<f64>,
    /// Average sleeping heart rate (bpm)
    pub heart_rate: Option<f64>,
    /// Deep sleep share (%)
    pub deep_sleep_pct: Option<f64>,
    /// REM sleep share (%)
    pub rem_sleep_pct: Option<f64>,
    /// Light sleep share (%), `100 - deep - rem`
    pub light_sleep_pct: Option<f64>,
}

impl Observation {
    /// Value of a raw numeric column. Returns `None` for missing values and
    /// for columns an observation does not carry.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::SleepDuration => self.sleep_duration,
            Column::QualityScore => self.quality_score,
            Column::Bedtime => self.bedtime,
            Column::WakeTime => self.wake_time,
            Column::ActivityLevel => self.activity_level,
            Column::StressLevel => self.stress_level,
            Column::HeartRate => self.heart_rate,
            Column::DeepSleepPct => self.deep_sleep_pct,
            Column::RemSleepPct => self.rem_sleep_pct,
            Column::LightSleepPct => self.light_sleep_pct,
            _ => None,
        }
    }

    fn slot(&mut self, column: Column) -> Option<&mut Option<f64>> {
        match column {
            Column::SleepDuration => Some(&mut self.sleep_duration),
            Column::QualityScore => Some(&mut self.quality_score),
            Column::Bedtime => Some(&mut self.bedtime),
            Column::WakeTime => Some(&mut self.wake_time),
            Column::ActivityLevel => Some(&mut self.activity_level),
            Column::StressLevel => Some(&mut self.stress_level),
            Column::HeartRate => Some(&mut self.heart_rate),
            Column::DeepSleepPct => Some(&mut self.deep_sleep_pct),
            Column::RemSleepPct => Some(&mut self.rem_sleep_pct),
            Column::LightSleepPct => Some(&mut self.light_sleep_pct),
            _ => None,
        }
    }
}

/// Features derived from an observation and its predecessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Calendar timestamp of bedtime
    pub bedtime_datetime: Option<NaiveDateTime>,
    /// Calendar timestamp of wake time
    pub wake_time_datetime: Option<NaiveDateTime>,
    /// `(deep + 0.5 * rem) / 100`
    pub sleep_efficiency: Option<f64>,
    /// Absolute bedtime change from the previous row; missing on the first row
    pub bedtime_shift: Option<f64>,
    /// `8 - sleep_duration`
    pub sleep_debt: Option<f64>,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
}

impl DerivedFeatures {
    fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::SleepEfficiency => self.sleep_efficiency,
            Column::BedtimeShift => self.bedtime_shift,
            Column::SleepDebt => self.sleep_debt,
            Column::DayOfWeek => Some(f64::from(self.day_of_week)),
            _ => None,
        }
    }

    fn slot(&mut self, column: Column) -> Option<&mut Option<f64>> {
        match column {
            Column::SleepEfficiency => Some(&mut self.sleep_efficiency),
            Column::BedtimeShift => Some(&mut self.bedtime_shift),
            Column::SleepDebt => Some(&mut self.sleep_debt),
            _ => None,
        }
    }
}

/// A table row: the observation plus its derived features once engineered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub observation: Observation,
    pub features: Option<DerivedFeatures>,
}

impl SleepRecord {
    pub fn new(observation: Observation) -> Self {
        Self {
            observation,
            features: None,
        }
    }

    /// Numeric value of any column (raw or derived)
    pub fn value(&self, column: Column) -> Option<f64> {
        if column.is_derived() {
            self.features.as_ref().and_then(|f| f.value(column))
        } else {
            self.observation.value(column)
        }
    }

    /// Whether the cell for `column` holds no value
    pub fn is_missing(&self, column: Column) -> bool {
        match column {
            Column::Date => false,
            Column::BedtimeDatetime => self
                .features
                .as_ref()
                .map_or(true, |f| f.bedtime_datetime.is_none()),
            Column::WakeTimeDatetime => self
                .features
                .as_ref()
                .map_or(true, |f| f.wake_time_datetime.is_none()),
            _ => self.value(column).is_none(),
        }
    }

    /// Turn NaN and infinite raw cells into missing ones. Returns how many
    /// cells were masked.
    pub(crate) fn mask_non_finite(&mut self) -> usize {
        let mut masked = 0;
        for column in Column::RAW {
            if self.value(column).is_some_and(|v| !v.is_finite()) {
                self.set(column, None);
                masked += 1;
            }
        }
        masked
    }

    /// Replace a floating-point cell. Returns false when the column cannot be
    /// written on this record.
    pub(crate) fn set(&mut self, column: Column, value: Option<f64>) -> bool {
        let slot = if column.is_derived() {
            self.features.as_mut().and_then(|f| f.slot(column))
        } else {
            self.observation.slot(column)
        };
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// An ordered collection of sleep records
///
/// The table remembers which raw columns its source supplied. A column the
/// source never provided is absent, which is not the same as a column whose
/// cells are all missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepTable {
    records: Vec<SleepRecord>,
    #[serde(default = "all_raw_columns")]
    raw_columns: BTreeSet<Column>,
}

fn all_raw_columns() -> BTreeSet<Column> {
    Column::RAW.into_iter().collect()
}

impl Default for SleepTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SleepTable {
    /// Table whose records carry every raw column
    pub fn new(records: Vec<SleepRecord>) -> Self {
        Self {
            records,
            raw_columns: all_raw_columns(),
        }
    }

    /// Table supplied with only `columns`. Derived columns in the list are
    /// ignored and `date` is always present.
    pub fn with_raw_columns(
        records: Vec<SleepRecord>,
        columns: impl IntoIterator<Item = Column>,
    ) -> Self {
        let raw_columns = columns
            .into_iter()
            .filter(|c| !c.is_derived())
            .chain([Column::Date])
            .collect();
        Self {
            records,
            raw_columns,
        }
    }

    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self::new(observations.into_iter().map(SleepRecord::new).collect())
    }

    /// Same columns, different rows
    pub(crate) fn with_records(&self, records: Vec<SleepRecord>) -> Self {
        Self {
            records,
            raw_columns: self.raw_columns.clone(),
        }
    }

    /// Split into rows and the raw column set, for row-level rewrites that
    /// keep the schema
    pub(crate) fn into_parts(self) -> (Vec<SleepRecord>, BTreeSet<Column>) {
        (self.records, self.raw_columns)
    }

    pub(crate) fn from_parts(records: Vec<SleepRecord>, raw_columns: BTreeSet<Column>) -> Self {
        Self {
            records,
            raw_columns,
        }
    }

    pub fn records(&self) -> &[SleepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SleepRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derived columns exist only once every record carries features
    pub fn has_features(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.features.is_some())
    }

    pub fn has_column(&self, column: Column) -> bool {
        if column.is_derived() {
            self.has_features()
        } else {
            self.raw_columns.contains(&column)
        }
    }

    /// Columns currently present, in schema order
    pub fn columns(&self) -> Vec<Column> {
        Column::all().filter(|c| self.has_column(*c)).collect()
    }

    /// Cells of a numeric column, one per row, `None` where missing
    pub fn column(
        &self,
        column: Column,
        operation: &'static str,
    ) -> Result<Vec<Option<f64>>, SchemaError> {
        self.require_numeric(column, operation)?;
        Ok(self.records.iter().map(|r| r.value(column)).collect())
    }

    /// Present values of a numeric column, skipping missing cells
    pub fn present_values(
        &self,
        column: Column,
        operation: &'static str,
    ) -> Result<Vec<f64>, SchemaError> {
        Ok(self.column(column, operation)?.into_iter().flatten().collect())
    }

    pub(crate) fn require_numeric(
        &self,
        column: Column,
        operation: &'static str,
    ) -> Result<(), SchemaError> {
        if !self.has_column(column) {
            return Err(SchemaError::MissingColumn { column, operation });
        }
        if !column.kind().is_numeric() {
            return Err(SchemaError::NotNumeric { column, operation });
        }
        Ok(())
    }
}

impl From<Vec<Observation>> for SleepTable {
    fn from(observations: Vec<Observation>) -> Self {
        Self::from_observations(observations)
    }
}

/// Calendar-date serde helpers accepting plain dates and midnight timestamps
pub(crate) mod calendar_date {
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const DATE_FORMAT: &str = "%Y-%m-%d";
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    pub fn parse(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
        let raw = raw.trim();
        let mut result = NaiveDate::parse_from_str(raw, DATE_FORMAT);
        for format in DATETIME_FORMATS {
            if result.is_ok() {
                break;
            }
            result = NaiveDateTime::parse_from_str(raw, format).map(|dt| dt.date());
        }
        result
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(|e| de::Error::custom(format!("invalid date '{raw}': {e}")))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::observation;
    use super::*;

    #[test]
    fn test_column_names_round_trip() {
        for column in Column::all() {
            assert_eq!(column.as_str().parse::<Column>().unwrap(), column);
        }
        assert!("bogus".parse::<Column>().is_err());
    }

    #[test]
    fn test_derived_column_absent_before_features() {
        let table = SleepTable::from_observations(vec![observation("2025-01-01", 7.0, 80.0)]);

        assert!(table.has_column(Column::SleepDuration));
        assert!(!table.has_column(Column::DayOfWeek));
        assert_eq!(
            table.column(Column::SleepDebt, "test"),
            Err(SchemaError::MissingColumn {
                column: Column::SleepDebt,
                operation: "test"
            })
        );
    }

    #[test]
    fn test_unsupplied_raw_column_is_absent() {
        let table = SleepTable::with_raw_columns(
            vec![SleepRecord::new(observation("2025-01-01", 7.0, 80.0))],
            [Column::SleepDuration, Column::QualityScore],
        );

        assert!(table.has_column(Column::Date));
        assert!(table.has_column(Column::SleepDuration));
        assert!(!table.has_column(Column::HeartRate));
        assert_eq!(
            table.columns(),
            vec![Column::Date, Column::SleepDuration, Column::QualityScore]
        );
        assert_eq!(
            table.present_values(Column::HeartRate, "test"),
            Err(SchemaError::MissingColumn {
                column: Column::HeartRate,
                operation: "test"
            })
        );
    }

    #[test]
    fn test_row_rewrites_keep_column_set() {
        let table = SleepTable::with_raw_columns(
            vec![SleepRecord::new(observation("2025-01-01", 7.0, 80.0))],
            [Column::SleepDuration],
        );
        let (records, columns) = table.clone().into_parts();
        let rebuilt = SleepTable::from_parts(records.clone(), columns);

        assert_eq!(rebuilt, table);
        assert!(!table.with_records(records).has_column(Column::StressLevel));
    }

    #[test]
    fn test_mask_non_finite_cells() {
        let mut obs = observation("2025-01-01", 7.0, 80.0);
        obs.sleep_duration = Some(f64::NAN);
        obs.heart_rate = Some(f64::INFINITY);
        let mut record = SleepRecord::new(obs);

        assert_eq!(record.mask_non_finite(), 2);
        assert_eq!(record.observation.sleep_duration, None);
        assert_eq!(record.observation.heart_rate, None);
        assert_eq!(record.observation.quality_score, Some(80.0));
    }

    #[test]
    fn test_date_column_is_not_numeric() {
        let table = SleepTable::from_observations(vec![observation("2025-01-01", 7.0, 80.0)]);
        assert!(matches!(
            table.column(Column::Date, "test"),
            Err(SchemaError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_present_values_skip_missing() {
        let mut second = observation("2025-01-02", 6.0, 70.0);
        second.sleep_duration = None;
        let table = SleepTable::from_observations(vec![observation("2025-01-01", 7.0, 80.0), second]);

        assert_eq!(
            table.column(Column::SleepDuration, "test").unwrap(),
            vec![Some(7.0), None]
        );
        assert_eq!(
            table.present_values(Column::SleepDuration, "test").unwrap(),
            vec![7.0]
        );
    }

    #[test]
    fn test_calendar_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(calendar_date::parse("2025-01-01").unwrap(), expected);
        assert_eq!(calendar_date::parse("2025-01-01 00:00:00").unwrap(), expected);
        assert_eq!(calendar_date::parse("2025-01-01T00:00:00").unwrap(), expected);
        assert!(calendar_date::parse("01/01/2025").is_err());
    }
}
