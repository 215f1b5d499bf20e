//! Error types for pipeline operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ArbError>;

/// Errors that can occur while loading, computing or publishing data.
#[derive(Debug, Error)]
pub enum ArbError {
    /// Missing required column in input data
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// None of the candidate locations holds the input file
    #[error("Input file {name} not found (searched: {searched:?})")]
    MissingInput {
        /// File name that was looked up
        name: String,
        /// Full paths that were checked
        searched: Vec<PathBuf>,
    },

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Pipeline state (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote download failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Downloaded or supplied data did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Measure or task not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The task graph contains a dependency cycle
    #[error("Task dependency cycle among: {0:?}")]
    TaskCycle(Vec<String>),

    /// A pipeline task action returned an error
    #[error("Task {task} failed: {source}")]
    TaskFailed {
        /// Name of the failing task
        task: String,
        /// Underlying error
        #[source]
        source: Box<ArbError>,
    },

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}
