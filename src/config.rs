//! Configuration for interpolation runs.
//!
//! The dispatcher receives everything it needs through
//! [`InterpolationConfig`]; nothing below the CLI layer reads the
//! environment.

use crate::constants::{DEFAULT_VARIABLE, SOURCE_EXTENSIONS};
use crate::error::{ExtractError, Result};
use crate::models::TargetLocation;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings for one interpolation run over a project's experiments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpolationConfig {
    /// Root holding `<project>/<experiment>/*.nc`
    pub source_path: PathBuf,

    /// Root receiving `<project>/<experiment>/*.parquet`
    pub output_path: PathBuf,

    /// Project directory name (CMIP5, CORDEX, ...)
    pub project: String,

    /// Experiment directory names under the project
    pub experiments: Vec<String>,

    /// Variable to interpolate
    pub variable: String,

    /// Worker pool size; fewer than two runs units one after another
    pub workers: usize,

    /// Reinterpolate files whose output already exists
    pub force_reprocess: bool,
}

impl InterpolationConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            project: project.into(),
            experiments: Vec::new(),
            variable: DEFAULT_VARIABLE.to_string(),
            workers: default_workers(),
            force_reprocess: false,
        }
    }

    pub fn with_experiments<S: Into<String>>(mut self, experiments: impl IntoIterator<Item = S>) -> Self {
        self.experiments = experiments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_force_reprocess(mut self, force: bool) -> Self {
        self.force_reprocess = force;
        self
    }

    /// Directory holding the source files of one experiment
    pub fn experiment_source_dir(&self, experiment: &str) -> PathBuf {
        self.source_path.join(&self.project).join(experiment)
    }

    /// Directory receiving the per-file arrays of one experiment
    pub fn experiment_output_dir(&self, experiment: &str) -> PathBuf {
        self.output_path.join(&self.project).join(experiment)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(ExtractError::configuration("Project name must not be empty"));
        }
        if self.experiments.is_empty() {
            return Err(ExtractError::configuration(
                "At least one experiment is required",
            ));
        }
        if let Some(bad) = self
            .experiments
            .iter()
            .find(|e| e.trim().is_empty() || e.contains(std::path::MAIN_SEPARATOR))
        {
            return Err(ExtractError::configuration(format!(
                "Invalid experiment name '{}'",
                bad
            )));
        }
        if self.variable.trim().is_empty() {
            return Err(ExtractError::configuration("Variable name must not be empty"));
        }

        debug!(
            "Interpolating '{}' for {} experiments of {} with {} workers (sources: *.{})",
            self.variable,
            self.experiments.len(),
            self.project,
            self.workers,
            SOURCE_EXTENSIONS.join(", *.")
        );
        Ok(())
    }
}

/// Worker count when none is configured: all CPUs but one, at least one
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Read target locations from a headered CSV file
///
/// Accepts `lat`/`lon` or `latitude`/`longitude` columns; other columns are
/// ignored. Rows keep their file order.
pub fn load_locations_csv(path: &Path) -> Result<Vec<TargetLocation>> {
    if !path.exists() {
        return Err(ExtractError::configuration(format!(
            "Locations file not found: {}",
            path.display()
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let latitudes = coordinate_column(&df, &["lat", "latitude"], path)?;
    let longitudes = coordinate_column(&df, &["lon", "longitude"], path)?;

    debug!("Loaded {} locations from {}", latitudes.len(), path.display());

    Ok(latitudes
        .into_iter()
        .zip(longitudes)
        .map(|(lat, lon)| TargetLocation::new(lat, lon))
        .collect())
}

fn coordinate_column(df: &DataFrame, names: &[&str], path: &Path) -> Result<Vec<f64>> {
    let name = names
        .iter()
        .find(|n| df.column(n).is_ok())
        .ok_or_else(|| {
            ExtractError::configuration(format!(
                "{} has no '{}' column",
                path.display(),
                names.join("' or '")
            ))
        })?;

    let column = df.column(name)?.cast(&DataType::Float64)?;
    let values = column.as_materialized_series().f64()?;

    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
