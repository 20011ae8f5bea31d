//! Error handling for interpolation and aggregation runs.
//!
//! Every stage error names the file it failed on and, for interpolation
//! work, the unit-of-work id, so a failed batch can be diagnosed from the
//! log alone.

use crate::grid::GridError;
use crate::reader::ReadError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Experiment directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to load grid file {path} (unit {unit_id}): {source}")]
    Load {
        path: PathBuf,
        unit_id: usize,
        #[source]
        source: ReadError,
    },

    #[error("Failed to reshape grid from {path} (unit {unit_id}): {source}")]
    Reshape {
        path: PathBuf,
        unit_id: usize,
        #[source]
        source: GridError,
    },

    #[error("Failed to crop grid from {path} (unit {unit_id}): {source}")]
    Crop {
        path: PathBuf,
        unit_id: usize,
        #[source]
        source: GridError,
    },

    #[error("Failed to interpolate grid from {path} (unit {unit_id}): {source}")]
    Interpolation {
        path: PathBuf,
        unit_id: usize,
        #[source]
        source: GridError,
    },

    #[error("Failed to persist {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Worker task for {path} did not complete: {reason}")]
    TaskFailed { path: PathBuf, reason: String },

    #[error("Invalid time offset {value} in {path}")]
    InvalidTimeOffset { path: PathBuf, value: f64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ExtractError {
    /// Create a persistence error with context
    pub fn persistence(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short stage label used in batch summaries
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Reshape { .. } => "reshape",
            Self::Crop { .. } => "crop",
            Self::Interpolation { .. } => "interpolate",
            Self::Persistence { .. } | Self::Io(_) | Self::Polars(_) => "persist",
            Self::SourceNotFound { .. } => "discover",
            Self::TaskFailed { .. } => "worker",
            Self::InvalidTimeOffset { .. } => "aggregate",
            Self::Configuration { .. } => "configure",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
