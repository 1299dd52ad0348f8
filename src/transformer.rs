//! Table transformation
//!
//! Cleaning plus an ordered list of transformation steps. Every step takes an
//! owned table and returns a new one, so the order of steps is an explicit
//! value that can be inspected and tested.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::FluxError;
use crate::features::FeatureDeriver;
use crate::normalizer::{Normalizer, DEFAULT_NORMALIZE_COLUMNS};
use crate::quality::{perform_quality_checks, QualityReport};
use crate::types::{Column, SleepRecord, SleepTable};

/// What `clean` does with negative numeric values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeValuePolicy {
    /// A single negative field drops the whole row
    #[default]
    DropRow,
    /// Negative fields become missing; the row is kept
    MaskValue,
    /// Negative values are left as they are
    Keep,
}

/// Clean a table: apply the negative-value policy, drop exact duplicate rows
/// (keeping the first occurrence), and sort by date.
///
/// Sorting is stable, so rows sharing a date keep their input order.
pub fn clean(table: SleepTable, policy: NegativeValuePolicy) -> SleepTable {
    let columns: Vec<Column> = table
        .columns()
        .into_iter()
        .filter(|c| c.kind().is_numeric())
        .collect();
    let input_rows = table.len();
    let (records, raw_columns) = table.into_parts();

    let mut records: Vec<SleepRecord> = match policy {
        NegativeValuePolicy::DropRow => records
            .into_iter()
            .filter(|r| !columns.iter().any(|&c| r.value(c).is_some_and(|v| v < 0.0)))
            .collect(),
        NegativeValuePolicy::MaskValue => records
            .into_iter()
            .map(|mut r| {
                for &column in &columns {
                    if r.value(column).is_some_and(|v| v < 0.0) {
                        r.set(column, None);
                    }
                }
                r
            })
            .collect(),
        NegativeValuePolicy::Keep => records,
    };
    let after_policy = records.len();

    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(fingerprint(r)));
    records.sort_by_key(|r| r.observation.date);

    if after_policy < input_rows {
        warn!(
            "Dropped {} rows containing negative values",
            input_rows - after_policy
        );
    }
    debug!(
        "Cleaned table: {} -> {} rows ({} duplicates removed)",
        input_rows,
        records.len(),
        after_policy - records.len()
    );

    SleepTable::from_parts(records, raw_columns)
}

/// Hashable identity of a row, comparing floats by bit pattern
fn fingerprint(record: &SleepRecord) -> (String, Vec<Option<u64>>) {
    let values = Column::all()
        .filter(|c| c.kind().is_numeric())
        .map(|c| record.value(c).map(value_bits))
        .chain(record.features.iter().flat_map(|f| {
            [
                f.bedtime_datetime.map(|t| t.and_utc().timestamp_millis() as u64),
                f.wake_time_datetime.map(|t| t.and_utc().timestamp_millis() as u64),
            ]
        }))
        .collect();
    (record.observation.date.to_string(), values)
}

/// Bit pattern of a cell, with `-0.0` folded into `0.0`
fn value_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// One named transformation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step", content = "options")]
pub enum TransformStep {
    Clean(NegativeValuePolicy),
    EngineerFeatures,
    /// Columns to scale; `None` selects the default metric set
    Normalize(Option<Vec<Column>>),
    QualityCheck,
}

impl TransformStep {
    pub fn name(&self) -> &'static str {
        match self {
            TransformStep::Clean(_) => "clean",
            TransformStep::EngineerFeatures => "engineer_features",
            TransformStep::Normalize(_) => "normalize",
            TransformStep::QualityCheck => "quality_check",
        }
    }
}

/// Result of running a transformer
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// The table after the last step
    pub table: SleepTable,
    /// Snapshot taken by the most recent quality-check step, if any ran
    pub quality_report: Option<QualityReport>,
}

/// Ordered list of transformation steps
///
/// The builder only records steps; nothing runs until [`Transformer::run`].
/// No particular order is enforced, but analysis by weekday expects
/// `engineer_features` to have run, and `bedtime_shift` expects `clean` to
/// have sorted the rows first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    steps: Vec<TransformStep>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transformer from an explicit step list
    pub fn with_steps(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    /// Clean, engineer features, then take a quality snapshot
    pub fn standard(policy: NegativeValuePolicy) -> Self {
        Self::new()
            .clean_with(policy)
            .engineer_features()
            .quality_checks()
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn push(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn clean(self) -> Self {
        self.push(TransformStep::Clean(NegativeValuePolicy::default()))
    }

    pub fn clean_with(self, policy: NegativeValuePolicy) -> Self {
        self.push(TransformStep::Clean(policy))
    }

    pub fn engineer_features(self) -> Self {
        self.push(TransformStep::EngineerFeatures)
    }

    pub fn normalize(self, columns: Option<Vec<Column>>) -> Self {
        self.push(TransformStep::Normalize(columns))
    }

    pub fn quality_checks(self) -> Self {
        self.push(TransformStep::QualityCheck)
    }

    /// Apply every step in order to `table`
    pub fn run(&self, table: SleepTable) -> Result<TransformOutput, FluxError> {
        let mut table = table;
        let mut quality_report = None;

        for step in &self.steps {
            table = match step {
                TransformStep::Clean(policy) => clean(table, *policy),
                TransformStep::EngineerFeatures => FeatureDeriver::derive(table),
                TransformStep::Normalize(columns) => {
                    let columns = columns.as_deref().unwrap_or(&DEFAULT_NORMALIZE_COLUMNS);
                    Normalizer::normalize(table, columns)?
                }
                TransformStep::QualityCheck => {
                    quality_report = Some(perform_quality_checks(&table));
                    table
                }
            };
            debug!("Step '{}' complete ({} rows)", step.name(), table.len());
        }

        info!(
            "Transformed table with {} steps, {} rows remain",
            self.steps.len(),
            table.len()
        );

        Ok(TransformOutput {
            table,
            quality_report,
        })
    }
}
