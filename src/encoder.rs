//! Report encoding
//!
//! This module wraps pipeline output in a versioned JSON envelope carrying
//! producer metadata, so consumers can tell which build produced a report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FluxError;
use crate::pipeline::PipelineOutput;
use crate::quality::QualityReport;
use crate::report::{Anomaly, SleepReport};
use crate::{FLUX_VERSION, PRODUCER_NAME};

/// Current report envelope version
pub const REPORT_VERSION: &str = "1.0.0";

/// Who produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Versioned wrapper around a sleep report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub report_version: String,
    pub producer: Producer,
    pub generated_at_utc: String,
    /// Rows in the analyzed table
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<Anomaly>>,
    pub report: SleepReport,
}

/// Encoder for report envelopes
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap a bare report
    pub fn encode_report(&self, report: &SleepReport, record_count: usize) -> ReportEnvelope {
        self.envelope(report.clone(), record_count, None, None, Utc::now())
    }

    /// Wrap a full pipeline output, including its quality snapshot and anomalies
    pub fn encode(&self, output: &PipelineOutput) -> ReportEnvelope {
        self.envelope(
            output.report.clone(),
            output.table.len(),
            output.quality_report.clone(),
            output.anomalies.clone(),
            Utc::now(),
        )
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, output: &PipelineOutput) -> Result<String, FluxError> {
        let envelope = self.encode(output);
        serde_json::to_string_pretty(&envelope).map_err(FluxError::JsonError)
    }

    fn envelope(
        &self,
        report: SleepReport,
        record_count: usize,
        quality: Option<QualityReport>,
        anomalies: Option<Vec<Anomaly>>,
        generated_at: DateTime<Utc>,
    ) -> ReportEnvelope {
        ReportEnvelope {
            report_version: REPORT_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at_utc: generated_at.to_rfc3339(),
            record_count,
            quality,
            anomalies,
            report,
        }
    }
}
