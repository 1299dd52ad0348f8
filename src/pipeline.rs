//! Pipeline orchestration
//!
//! This module provides the top-level API for Sleep Flux. It runs the full
//! pipeline from a raw table (generated or loaded) to an encoded report.

use log::{info, warn};
use std::path::Path;

use crate::analyzer::SleepAnalyzer;
use crate::config::PipelineConfig;
use crate::encoder::ReportEncoder;
use crate::error::FluxError;
use crate::generator::SleepDataGenerator;
use crate::loader::{CsvSource, TableSource};
use crate::normalizer::Normalizer;
use crate::quality::QualityReport;
use crate::report::{Anomaly, OmittedSection, ReportSection, SleepReport};
use crate::transformer::Transformer;
use crate::types::SleepTable;

/// Generate a synthetic table and return its report envelope as JSON.
///
/// # Example
/// ```ignore
/// let json = generate_and_analyze(&PipelineConfig::default())?;
/// ```
pub fn generate_and_analyze(config: &PipelineConfig) -> Result<String, FluxError> {
    let pipeline = SleepPipeline::new(config.clone())?;
    let output = pipeline.run_generated()?;
    pipeline.encoder().encode_to_json(&output)
}

/// Load a CSV file and return its report envelope as JSON
pub fn analyze_csv(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<String, FluxError> {
    let pipeline = SleepPipeline::new(config.clone())?;
    let output = pipeline.run_source(&CsvSource::new(path.as_ref()))?;
    pipeline.encoder().encode_to_json(&output)
}

/// Everything one pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Cleaned table with derived features
    pub table: SleepTable,
    /// Normalized copy of `table`, when normalization is configured
    pub normalized: Option<SleepTable>,
    /// Snapshot taken after feature engineering
    pub quality_report: Option<QualityReport>,
    /// Rows flagged on the configured anomaly column
    pub anomalies: Option<Vec<Anomaly>>,
    pub report: SleepReport,
}

/// Configured pipeline.
///
/// Stages:
/// 1. Source - generate or load a raw table
/// 2. Transformer - clean, engineer features, quality snapshot
/// 3. Normalizer - optional scaled copy of the table
/// 4. SleepAnalyzer - anomalies and the composed report
pub struct SleepPipeline {
    config: PipelineConfig,
    encoder: ReportEncoder,
}

impl SleepPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, FluxError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn encoder(&self) -> &ReportEncoder {
        &self.encoder
    }

    /// Steps applied to every raw table
    pub fn transformer(&self) -> Transformer {
        Transformer::standard(self.config.negative_values)
    }

    /// Generate `samples` rows with the configured seed and process them
    pub fn run_generated(&self) -> Result<PipelineOutput, FluxError> {
        let mut generator = SleepDataGenerator::new(self.config.samples, self.config.seed)?;
        self.process(generator.generate())
    }

    pub fn run_source(&self, source: &dyn TableSource) -> Result<PipelineOutput, FluxError> {
        info!("Loading table from {}", source.describe());
        let table = source.load()?;
        self.process(table)
    }

    /// Transform and analyze a raw table
    pub fn process(&self, raw: SleepTable) -> Result<PipelineOutput, FluxError> {
        let transformed = self.transformer().run(raw)?;
        let table = transformed.table;

        let normalized = match &self.config.normalize {
            Some(columns) => Some(Normalizer::normalize(table.clone(), columns)?),
            None => None,
        };

        let analyzer = SleepAnalyzer::new(&table);
        let mut report = analyzer.generate_report_with_window(self.config.trend_window);
        let anomalies = match analyzer
            .detect_anomalies(self.config.anomaly_column, self.config.anomaly_threshold)
        {
            Ok(anomalies) => Some(anomalies),
            Err(e) => {
                warn!("Skipping anomaly detection: {}", e);
                report.omitted.push(OmittedSection {
                    section: ReportSection::Anomalies,
                    reason: e.to_string(),
                });
                None
            }
        };

        info!(
            "Pipeline complete: {} rows, {} anomalies",
            table.len(),
            anomalies.as_ref().map_or(0, Vec::len)
        );

        Ok(PipelineOutput {
            table,
            normalized,
            quality_report: transformed.quality_report,
            anomalies,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::export_csv;
    use crate::types::test_support::observation;
    use crate::types::Column;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            samples: 120,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_generated() {
        let pipeline = SleepPipeline::new(small_config()).unwrap();
        let output = pipeline.run_generated().unwrap();

        assert!(output.table.has_features());
        assert!(output.table.len() <= 120);
        assert!(output.report.is_complete());
        assert!(output.anomalies.is_some());
        assert_eq!(
            output.quality_report.unwrap().record_count,
            output.table.len()
        );
        assert!(output.normalized.is_none());
    }

    #[test]
    fn test_same_seed_same_report() {
        let first = SleepPipeline::new(small_config())
            .unwrap()
            .run_generated()
            .unwrap();
        let second = SleepPipeline::new(small_config())
            .unwrap()
            .run_generated()
            .unwrap();

        assert_eq!(first.report, second.report);
    }

    #[test]
    fn test_normalized_copy_leaves_table_unscaled() {
        let config = PipelineConfig {
            normalize: Some(vec![Column::SleepDuration]),
            ..small_config()
        };
        let output = SleepPipeline::new(config).unwrap().run_generated().unwrap();

        let normalized = output.normalized.unwrap();
        assert_eq!(normalized.len(), output.table.len());
        let mean = output.report.basic_stats.unwrap().sleep_duration.mean;
        assert!(mean > 4.0);
    }

    #[test]
    fn test_zero_variance_anomaly_column_is_omitted() {
        let config = PipelineConfig {
            anomaly_column: Column::ActivityLevel,
            trend_window: 2,
            ..Default::default()
        };
        let raw = SleepTable::from_observations(vec![
            observation("2025-01-01", 7.0, 70.0),
            observation("2025-01-02", 8.0, 75.0),
            observation("2025-01-03", 6.0, 65.0),
        ]);

        let output = SleepPipeline::new(config).unwrap().process(raw).unwrap();

        assert_eq!(output.anomalies, None);
        assert_eq!(output.report.omitted.len(), 1);
        assert_eq!(output.report.omitted[0].section, ReportSection::Anomalies);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            trend_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            SleepPipeline::new(config),
            Err(FluxError::Config(_))
        ));
    }

    #[test]
    fn test_zero_samples_only_fails_generated_runs() {
        let config = PipelineConfig {
            samples: 0,
            trend_window: 2,
            ..Default::default()
        };
        let pipeline = SleepPipeline::new(config.clone()).unwrap();
        assert!(matches!(
            pipeline.run_generated(),
            Err(FluxError::InvalidSampleCount(0))
        ));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sleep.csv");
        let raw = SleepTable::from_observations(vec![
            observation("2025-01-01", 7.0, 70.0),
            observation("2025-01-02", 8.0, 75.0),
            observation("2025-01-03", 6.0, 65.0),
        ]);
        export_csv(&raw, &path).unwrap();

        let json = analyze_csv(&path, &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["record_count"], 3);
    }

    #[test]
    fn test_generate_and_analyze_json() {
        let json = generate_and_analyze(&small_config()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["producer"]["name"], "sleep-flux");
        assert!(value["report"]["basic_stats"]["sleep_duration"]["mean"].is_number());
    }
}
