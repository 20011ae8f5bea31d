//! Core data structures shared by the interpolation and aggregation stages.
//!
//! Defines target locations, units of work, model identities parsed from
//! filenames, per-run reports and the seasonal cube bundle.

use crate::error::{ExtractError, Result};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// One point at which gridded values are wanted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl TargetLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse a `LAT,LON` pair such as `"-33.9,18.4"`
    pub fn parse(value: &str) -> Result<Self> {
        let (lat, lon) = value.split_once(',').ok_or_else(|| {
            ExtractError::configuration(format!("Expected LAT,LON but got '{}'", value))
        })?;

        let parse_coord = |s: &str| {
            s.trim().parse::<f64>().map_err(|e| {
                ExtractError::configuration(format!("Invalid coordinate '{}': {}", s.trim(), e))
            })
        };

        Ok(Self::new(parse_coord(lat)?, parse_coord(lon)?))
    }
}

/// Ordered, non-empty list of target locations, fixed for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLocations(Vec<TargetLocation>);

impl TargetLocations {
    /// Validate and wrap a list of locations
    ///
    /// The list must be non-empty and every coordinate finite; the
    /// interpolator cannot place NaN positions in a triangulation.
    pub fn new(locations: Vec<TargetLocation>) -> Result<Self> {
        if locations.is_empty() {
            return Err(ExtractError::configuration(
                "At least one target location is required",
            ));
        }

        if let Some((i, bad)) = locations
            .iter()
            .enumerate()
            .find(|(_, l)| !l.latitude.is_finite() || !l.longitude.is_finite())
        {
            return Err(ExtractError::configuration(format!(
                "Target location {} has a non-finite coordinate ({}, {})",
                i, bad.latitude, bad.longitude
            )));
        }

        Ok(Self(locations))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetLocation> {
        self.0.iter()
    }

    /// (min, max) latitude over all targets
    pub fn latitude_range(&self) -> (f64, f64) {
        min_max(self.0.iter().map(|l| l.latitude))
    }

    /// (min, max) longitude over all targets
    pub fn longitude_range(&self) -> (f64, f64) {
        min_max(self.0.iter().map(|l| l.longitude))
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// One source file's interpolation job
#[derive(Debug, Clone)]
pub struct WorkUnit {
    /// Sequential id within the experiment batch, used in diagnostics
    pub id: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    pub variable: String,
    pub locations: Arc<TargetLocations>,
    /// Replace an existing output file
    pub overwrite: bool,
}

/// Filename did not follow the model naming grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename '{name}' has {found} underscore-delimited tokens, need at least 6")]
    TooFewTokens { name: String, found: usize },

    #[error("filename '{name}' has an empty token at position {position}")]
    EmptyToken { name: String, position: usize },

    #[error("path '{0}' has no usable file name")]
    NoFileName(PathBuf),
}

/// Model label derived from a source filename
///
/// Filenames follow the ESGF convention
/// `<var>_<domain>_<driving-model>_<experiment>_<member>_<rcm>_...`.
/// The identity joins the driving model (token 2) and the downscaling
/// model (token 5) with an underscore, e.g.
/// `tas_AFR-44_ICHEC-EC-EARTH_historical_r12i1p1_SMHI-RCA4_v1_mon_195101-200512`
/// becomes `ICHEC-EC-EARTH_SMHI-RCA4`. Only the file stem is considered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity(String);

impl ModelIdentity {
    const DRIVING_TOKEN: usize = 2;
    const RCM_TOKEN: usize = 5;

    pub fn from_path(path: &Path) -> std::result::Result<Self, FilenameError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FilenameError::NoFileName(path.to_path_buf()))?;
        Self::parse(stem)
    }

    pub fn parse(stem: &str) -> std::result::Result<Self, FilenameError> {
        let tokens: Vec<&str> = stem.split('_').collect();
        if tokens.len() <= Self::RCM_TOKEN {
            return Err(FilenameError::TooFewTokens {
                name: stem.to_string(),
                found: tokens.len(),
            });
        }

        for position in [Self::DRIVING_TOKEN, Self::RCM_TOKEN] {
            if tokens[position].is_empty() {
                return Err(FilenameError::EmptyToken {
                    name: stem.to_string(),
                    position,
                });
            }
        }

        Ok(Self(format!(
            "{}_{}",
            tokens[Self::DRIVING_TOKEN],
            tokens[Self::RCM_TOKEN]
        )))
    }

    /// Placeholder label for files that do not follow the grammar
    pub fn placeholder(model_id: i64) -> Self {
        Self(format!("model_{}", model_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one unit of work
#[derive(Debug)]
pub struct TaskOutcome {
    pub unit_id: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    /// Number of timesteps written on success
    pub result: Result<usize>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Interpolation statistics for one experiment
#[derive(Debug, Default)]
pub struct ExperimentReport {
    pub experiment: String,
    pub source_dir: PathBuf,
    /// Source files found in the experiment directory
    pub sources_found: usize,
    /// Source files selected for processing after the resume check
    pub to_process: usize,
    pub outcomes: Vec<TaskOutcome>,
}

impl ExperimentReport {
    pub fn files_processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    /// Sources skipped because their output already existed
    pub fn files_skipped(&self) -> usize {
        self.sources_found - self.to_process
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Summary of an interpolation run across experiments
#[derive(Debug, Default)]
pub struct BatchReport {
    pub experiments: Vec<ExperimentReport>,
    pub processing_time_ms: u128,
}

impl BatchReport {
    pub fn files_processed(&self) -> usize {
        self.experiments.iter().map(|e| e.files_processed()).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.experiments.iter().map(|e| e.files_failed()).sum()
    }

    pub fn files_skipped(&self) -> usize {
        self.experiments.iter().map(|e| e.files_skipped()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.files_failed() == 0
    }
}

/// Mean seasonal temperature per experiment, indexed `[location, year, model]`
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalCube {
    /// Model names, one per entry of the model axis
    pub models: Vec<String>,
    /// Sorted years, one per entry of the year axis
    pub years: Vec<i32>,
    /// Sorted location ids, one per entry of the location axis
    pub locations: Vec<i64>,
    pub temps: Array3<f64>,
}

impl SeasonalCube {
    pub fn empty() -> Self {
        Self {
            models: Vec::new(),
            years: Vec::new(),
            locations: Vec::new(),
            temps: Array3::zeros((0, 0, 0)),
        }
    }

    /// Index of a year on the year axis
    pub fn year_index(&self, year: i32) -> Option<usize> {
        self.years.binary_search(&year).ok()
    }

    /// Mean for a location id, year and model axis index
    pub fn get(&self, location: i64, year: i32, model_index: usize) -> Option<f64> {
        let l = self.locations.binary_search(&location).ok()?;
        let y = self.year_index(year)?;
        self.temps.get((l, y, model_index)).copied()
    }
}
