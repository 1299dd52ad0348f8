//! Sleep Flux - batch ETL and analysis for daily sleep-health records
//!
//! Flux turns raw sleep observations into an analysis report through a
//! deterministic pipeline: generation or loading → cleaning → feature
//! derivation → quality checks → statistical analysis → report encoding.
//!
//! ## Modules
//!
//! - **Table Pipeline**: generate or load a table, transform it, and analyze it
//! - **Risk Heuristics**: score a single night's metrics against fixed thresholds

pub mod analyzer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod generator;
pub mod loader;
pub mod normalizer;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod risk;
pub mod stats;
pub mod transformer;
pub mod types;

pub use analyzer::SleepAnalyzer;
pub use config::PipelineConfig;
pub use encoder::{ReportEncoder, ReportEnvelope};
pub use error::{AnalysisError, FluxError, LoadError, SchemaError};
pub use generator::{generate_table, SleepDataGenerator};
pub use loader::{export_csv, load_from_csv, load_from_database, TableSource};
pub use pipeline::{analyze_csv, generate_and_analyze, PipelineOutput, SleepPipeline};
pub use report::SleepReport;
pub use risk::{AssessmentHistory, RiskAssessment, RiskInputs};
pub use transformer::{NegativeValuePolicy, Transformer};
pub use types::{Column, Observation, SleepRecord, SleepTable};

/// Flux version embedded in all report envelopes
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report envelopes
pub const PRODUCER_NAME: &str = "sleep-flux";
