//! Column normalization
//!
//! Rescales selected columns to zero mean and unit variance. Scaling
//! parameters are fitted on the table being transformed; there is no held-out
//! reference distribution.
//! - Missing cells stay missing and do not contribute to the fit
//! - Zero-variance columns are centred and left at scale 1
//! - Columns without any present value, or with non-finite ones, cannot be fitted

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, FluxError, SchemaError};
use crate::stats;
use crate::types::{Column, ColumnKind, SleepTable};

/// Columns scaled when the caller does not choose any
pub const DEFAULT_NORMALIZE_COLUMNS: [Column; 5] = [
    Column::SleepDuration,
    Column::QualityScore,
    Column::ActivityLevel,
    Column::StressLevel,
    Column::HeartRate,
];

const OPERATION: &str = "normalize";

/// Fitted location and scale for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub column: Column,
    pub mean: f64,
    pub scale: f64,
}

impl ColumnScaling {
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Standard-score normalizer
pub struct Normalizer;

impl Normalizer {
    /// Fit scaling parameters for `columns` on `table`.
    ///
    /// Only floating-point columns can be scaled; derived columns require
    /// feature engineering to have run.
    pub fn fit(table: &SleepTable, columns: &[Column]) -> Result<Vec<ColumnScaling>, FluxError> {
        columns
            .iter()
            .map(|&column| -> Result<ColumnScaling, FluxError> {
                table.require_numeric(column, OPERATION)?;
                if column.kind() != ColumnKind::Float {
                    return Err(SchemaError::NotNumeric {
                        column,
                        operation: OPERATION,
                    }
                    .into());
                }
                let values = table.present_values(column, OPERATION)?;
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(AnalysisError::NonFinite {
                        operation: OPERATION,
                        column,
                    }
                    .into());
                }
                let mean = stats::mean(&values).ok_or(AnalysisError::NoValues {
                    operation: OPERATION,
                    column,
                })?;
                let scale = match stats::std_dev(&values, 0) {
                    Some(std) if std > 0.0 => std,
                    _ => 1.0,
                };
                Ok(ColumnScaling {
                    column,
                    mean,
                    scale,
                })
            })
            .collect()
    }

    /// Fit on `table` and apply the result to it
    pub fn normalize(table: SleepTable, columns: &[Column]) -> Result<SleepTable, FluxError> {
        let scalings = Self::fit(&table, columns)?;
        let (mut records, raw_columns) = table.into_parts();

        for scaling in &scalings {
            for record in records.iter_mut() {
                if let Some(value) = record.value(scaling.column) {
                    record.set(scaling.column, Some(scaling.apply(value)));
                }
            }
            debug!(
                "Normalized {} (mean {:.4}, scale {:.4})",
                scaling.column, scaling.mean, scaling.scale
            );
        }

        Ok(SleepTable::from_parts(records, raw_columns))
    }
}

/// Normalize `columns`, or the default metric set when `None`
pub fn normalize(table: SleepTable, columns: Option<&[Column]>) -> Result<SleepTable, FluxError> {
    Normalizer::normalize(table, columns.unwrap_or(&DEFAULT_NORMALIZE_COLUMNS))
}
