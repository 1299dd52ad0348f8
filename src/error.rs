//! Error types for Sleep Flux

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Column;

/// Boxed underlying cause carried by load failures
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while reading a table from an external source
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Error loading data from {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: BoxedCause,
    },

    #[error("Error loading data from database: {source}")]
    Query {
        #[source]
        source: BoxedCause,
    },
}

impl LoadError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: impl Into<BoxedCause>) -> Self {
        LoadError::File {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn query(source: impl Into<BoxedCause>) -> Self {
        LoadError::Query {
            source: source.into(),
        }
    }
}

/// A required column is absent or has the wrong shape for an operation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{operation}: column '{column}' is not present")]
    MissingColumn {
        column: Column,
        operation: &'static str,
    },

    #[error("{operation}: column '{column}' is not numeric")]
    NotNumeric {
        column: Column,
        operation: &'static str,
    },
}

/// Degenerate statistical input
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("{operation}: column '{column}' has zero variance")]
    ZeroVariance {
        operation: &'static str,
        column: Column,
    },

    #[error("{operation}: column '{column}' contains NaN or infinite values")]
    NonFinite {
        operation: &'static str,
        column: Column,
    },

    #[error("{operation}: column '{column}' has no values")]
    NoValues {
        operation: &'static str,
        column: Column,
    },

    #[error("{operation}: window of {window} rows is invalid for a table of {rows} rows")]
    InvalidWindow {
        operation: &'static str,
        window: usize,
        rows: usize,
    },
}

/// Errors that can occur anywhere in the pipeline
#[derive(Debug, Error)]
pub enum FluxError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Sample count must be positive, got {0}")]
    InvalidSampleCount(usize),

    #[error("Invalid sampling distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
