//! Pipeline configuration loaded from JSON

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analyzer::{DEFAULT_ANOMALY_THRESHOLD, DEFAULT_TREND_WINDOW};
use crate::error::FluxError;
use crate::generator::{DEFAULT_SAMPLES, DEFAULT_SEED};
use crate::transformer::NegativeValuePolicy;
use crate::types::Column;

/// Settings for a full generate/transform/analyze run.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows to generate
    pub samples: usize,
    /// Generator seed
    pub seed: u64,
    /// Treatment of negative values during cleaning
    pub negative_values: NegativeValuePolicy,
    /// Columns to normalize into a separate output table; `None` disables it
    pub normalize: Option<Vec<Column>>,
    /// Column scanned for anomalies
    pub anomaly_column: Column,
    pub anomaly_threshold: f64,
    pub trend_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            seed: DEFAULT_SEED,
            negative_values: NegativeValuePolicy::default(),
            normalize: None,
            anomaly_column: Column::SleepDuration,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            trend_window: DEFAULT_TREND_WINDOW,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FluxError> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings every run uses. `samples` only matters for
    /// generated runs and is checked by the generator.
    pub fn validate(&self) -> Result<(), FluxError> {
        if self.trend_window == 0 {
            return Err(FluxError::Config("trend_window must be positive".to_string()));
        }
        if !self.anomaly_threshold.is_finite() || self.anomaly_threshold < 0.0 {
            return Err(FluxError::Config(format!(
                "anomaly_threshold must be a non-negative number, got {}",
                self.anomaly_threshold
            )));
        }
        if !self.anomaly_column.kind().is_numeric() {
            return Err(FluxError::Config(format!(
                "anomaly_column '{}' is not numeric",
                self.anomaly_column
            )));
        }
        Ok(())
    }
}
