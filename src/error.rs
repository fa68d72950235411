// src/error.rs

use std::{io, path::PathBuf};
use thiserror::Error;

/// Every failure the analysis core can surface. All variants are batch-fatal:
/// nothing is retried and no partial table is returned alongside an error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Malformed or incomplete configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A dataset or config file could not be found, read or decoded.
    #[error("data source error ({path}): {reason}")]
    DataSource { path: PathBuf, reason: String },

    /// A field spec references a column the crash dataset does not have,
    /// or targets a column that cannot be summed.
    #[error("field `{field}`: {reason}")]
    QueryCompile { field: String, reason: String },

    /// The population join for one region/year matched zero or several rows.
    #[error("population lookup for {region}/{year}: {reason}")]
    Lookup {
        region: String,
        year: i64,
        reason: String,
    },

    /// Trend fitting was attempted on a series it cannot fit.
    #[error("trend fit failed: {0}")]
    ModelFit(String),

    /// A single aggregation cell failed; wraps the underlying error with the cell key.
    #[error("cell ({field}, {region}, {year}) failed: {source}")]
    Cell {
        field: String,
        region: String,
        year: i64,
        #[source]
        source: Box<AnalysisError>,
    },

    /// Gathered results could not be re-nested into the output table.
    #[error("result assembly failed: {0}")]
    Assembly(String),

    /// The worker pool could not be started.
    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl AnalysisError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data_source(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn query_compile(field: &str, reason: impl Into<String>) -> Self {
        Self::QueryCompile {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
