//! Seasonal aggregation of interpolated arrays.
//!
//! For an experiment directory of per-file arrays, compute the winter mean
//! temperature per `(location, year, model)` and persist it next to the
//! arrays. Later loads read the persisted cube unless a recompute is forced.

pub mod cache;
pub mod dates;
pub mod table;

use crate::constants::{ARRAY_EXTENSION, CACHE_FILE_NAME};
use crate::error::{ExtractError, Result};
use crate::models::{ModelIdentity, SeasonalCube};
use crate::processor::writer::read_series;

use polars::prelude::IntoLazy;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Loads and caches seasonal cubes for the experiments under `data_path`
#[derive(Debug)]
pub struct Aggregator {
    data_path: PathBuf,
    cubes: HashMap<String, SeasonalCube>,
    recomputations: usize,
}

impl Aggregator {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            cubes: HashMap::new(),
            recomputations: 0,
        }
    }

    /// Number of cubes computed from per-file arrays rather than loaded
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Cube already loaded for an experiment
    pub fn cube(&self, experiment: &str) -> Option<&SeasonalCube> {
        self.cubes.get(experiment)
    }

    pub fn cache_path(&self, experiment: &str) -> PathBuf {
        self.data_path.join(experiment).join(CACHE_FILE_NAME)
    }

    /// Load the winter cube of one experiment
    ///
    /// Served from memory, then from the cache file; otherwise computed
    /// and persisted. `force` skips both caches.
    pub fn load_experiment(&mut self, experiment: &str, force: bool) -> Result<&SeasonalCube> {
        let cache = self.cache_path(experiment);

        let cube = if !force && self.cubes.contains_key(experiment) {
            debug!("Using in-memory winter averages for {}", experiment);
            None
        } else if !force && cache.exists() {
            info!("Loading cached winter averages from {}", cache.display());
            Some(cache::read_cube(&cache)?)
        } else {
            let cube = self.compute(experiment)?;
            cache::write_cube(&cache, &cube)?;
            self.recomputations += 1;
            Some(cube)
        };

        let slot = self
            .cubes
            .entry(experiment.to_string())
            .or_insert_with(SeasonalCube::empty);
        if let Some(cube) = cube {
            *slot = cube;
        }
        Ok(slot)
    }

    /// Load the winter cubes of several experiments
    pub fn load_winter_averages(
        &mut self,
        experiments: &[String],
        force: bool,
    ) -> Result<HashMap<String, SeasonalCube>> {
        let mut cubes = HashMap::with_capacity(experiments.len());
        for experiment in experiments {
            let cube = self.load_experiment(experiment, force)?.clone();
            cubes.insert(experiment.clone(), cube);
        }
        Ok(cubes)
    }

    /// Per-file arrays of an experiment, sorted, excluding the cache file
    pub fn array_files(&self, experiment: &str) -> Result<Vec<PathBuf>> {
        let dir = self.data_path.join(experiment);
        if !dir.is_dir() {
            return Err(ExtractError::SourceNotFound { path: dir });
        }

        let dir_str = dir.to_str().ok_or_else(|| {
            ExtractError::configuration(format!("Non UTF-8 data path: {}", dir.display()))
        })?;
        let pattern = format!("{}/*.{}", glob::Pattern::escape(dir_str), ARRAY_EXTENSION);

        let mut files = Vec::new();
        for entry in glob::glob(&pattern)
            .map_err(|e| ExtractError::configuration(format!("Invalid glob pattern: {}", e)))?
        {
            let path = entry.map_err(|e| e.into_error())?;
            if path.file_name().is_some_and(|n| n == CACHE_FILE_NAME) {
                continue;
            }
            files.push(path);
        }

        files.sort();
        Ok(files)
    }

    fn compute(&self, experiment: &str) -> Result<SeasonalCube> {
        let files = self.array_files(experiment)?;
        info!(
            "Extracting winter averages from {}",
            self.data_path.join(experiment).display()
        );
        info!("\t{} files.", files.len());

        if files.is_empty() {
            return Ok(SeasonalCube::empty());
        }

        let mut names = HashMap::with_capacity(files.len());
        let mut frames = Vec::with_capacity(files.len());

        for (index, path) in files.iter().enumerate() {
            let model_id = index as i64;
            let name = ModelIdentity::from_path(path).unwrap_or_else(|e| {
                warn!("{}; using placeholder model name", e);
                ModelIdentity::placeholder(model_id)
            });
            names.insert(model_id, name.into_string());

            let series = read_series(path)?;
            frames.push(table::series_to_long(&series, model_id, path)?.lazy());
        }

        let grouped = table::winter_means(frames)?;
        let cube = table::build_cube(&grouped, &names)?;

        debug!(
            "{}: {} locations x {} years x {} models",
            experiment,
            cube.locations.len(),
            cube.years.len(),
            cube.models.len()
        );
        Ok(cube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::writer::SeriesWriter;
    use ndarray::{Array2, array};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const MODEL_A: &str = "tas_AFR-44_DRIVER-A_historical_r1i1p1_RCM-A_v1_mon_195101-200512.parquet";
    const MODEL_B: &str = "tas_AFR-44_DRIVER-B_historical_r1i1p1_RCM-B_v1_mon_195101-200512.parquet";

    fn write(dir: &Path, name: &str, series: &Array2<f64>) {
        SeriesWriter::new(dir.join(name), false).write(series).unwrap();
    }

    /// Two models, two locations; offsets 31/62 are Jan/Feb 1950, 182 is June
    fn setup(temp_dir: &TempDir) -> PathBuf {
        let dir = temp_dir.path().join("historical");
        fs::create_dir_all(&dir).unwrap();
        write(&dir, MODEL_A, &array![[31.0, 2.0, 7.0], [62.0, 4.0, 9.0], [182.0, 50.0, 50.0]]);
        write(&dir, MODEL_B, &array![[31.0, 1.0, 1.0], [62.0, 1.0, 1.0], [182.0, 0.0, 0.0]]);
        temp_dir.path().to_path_buf()
    }

    fn bits(cube: &SeasonalCube) -> Vec<u64> {
        cube.temps.iter().map(|v| v.to_bits()).collect()
    }

    #[test]
    fn test_compute_winter_means() {
        let temp_dir = TempDir::new().unwrap();
        let mut aggregator = Aggregator::new(setup(&temp_dir));

        let cube = aggregator.load_experiment("historical", false).unwrap().clone();

        assert_eq!(cube.models, vec!["DRIVER-A_RCM-A", "DRIVER-B_RCM-B"]);
        assert_eq!(cube.years, vec![1950]);
        assert_eq!(cube.locations, vec![0, 1]);
        assert_eq!(cube.temps.dim(), (2, 1, 2));
        assert_eq!(cube.get(0, 1950, 0), Some(3.0));
        assert_eq!(cube.get(1, 1950, 0), Some(8.0));
        assert_eq!(cube.get(0, 1950, 1), Some(1.0));
        assert_eq!(aggregator.recomputations(), 1);
        assert!(aggregator.cache_path("historical").exists());
    }

    #[test]
    fn test_cache_hit_is_exact_and_not_recomputed() {
        let temp_dir = TempDir::new().unwrap();
        let root = setup(&temp_dir);

        let mut first = Aggregator::new(&root);
        let computed = first.load_experiment("historical", false).unwrap().clone();

        let again = first.load_experiment("historical", false).unwrap().clone();
        assert_eq!(first.recomputations(), 1);
        assert_eq!(bits(&again), bits(&computed));

        let mut second = Aggregator::new(&root);
        let loaded = second.load_experiment("historical", false).unwrap().clone();
        assert_eq!(second.recomputations(), 0);
        assert_eq!(loaded.models, computed.models);
        assert_eq!(loaded.years, computed.years);
        assert_eq!(bits(&loaded), bits(&computed));
    }

    #[test]
    fn test_force_recomputes() {
        let temp_dir = TempDir::new().unwrap();
        let root = setup(&temp_dir);

        let mut aggregator = Aggregator::new(&root);
        aggregator.load_experiment("historical", false).unwrap();

        // a new array only shows up after a forced recompute
        write(
            &root.join("historical"),
            "tas_AFR-44_DRIVER-C_historical_r1i1p1_RCM-C_v1.parquet",
            &array![[31.0, 5.0, 5.0]],
        );
        assert_eq!(aggregator.load_experiment("historical", false).unwrap().models.len(), 2);
        assert_eq!(aggregator.load_experiment("historical", true).unwrap().models.len(), 3);
        assert_eq!(aggregator.recomputations(), 2);
    }

    #[test]
    fn test_malformed_filename_uses_placeholder() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("rcp45");
        fs::create_dir_all(&dir).unwrap();
        write(&dir, "tas_short.parquet", &array![[31.0, 1.0]]);

        let mut aggregator = Aggregator::new(temp_dir.path());
        let cube = aggregator.load_experiment("rcp45", false).unwrap();
        assert_eq!(cube.models, vec!["model_0"]);
    }

    #[test]
    fn test_array_files_skip_cache_and_sort() {
        let temp_dir = TempDir::new().unwrap();
        let root = setup(&temp_dir);
        let mut aggregator = Aggregator::new(&root);
        aggregator.load_experiment("historical", false).unwrap();

        let files = aggregator.array_files("historical").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![MODEL_A, MODEL_B]);
    }

    #[test]
    fn test_missing_experiment_and_empty_experiment() {
        let temp_dir = TempDir::new().unwrap();
        let mut aggregator = Aggregator::new(temp_dir.path());
        assert!(matches!(
            aggregator.load_experiment("absent", false),
            Err(ExtractError::SourceNotFound { .. })
        ));

        fs::create_dir_all(temp_dir.path().join("empty")).unwrap();
        let cube = aggregator.load_experiment("empty", false).unwrap();
        assert!(cube.models.is_empty());
    }

    #[test]
    fn test_load_winter_averages_maps_experiments() {
        let temp_dir = TempDir::new().unwrap();
        let root = setup(&temp_dir);
        fs::create_dir_all(root.join("rcp85")).unwrap();
        write(&root.join("rcp85"), MODEL_A, &array![[396.0, 10.0, 20.0]]);

        let mut aggregator = Aggregator::new(&root);
        let cubes = aggregator
            .load_winter_averages(&["historical".to_string(), "rcp85".to_string()], false)
            .unwrap();

        assert_eq!(cubes.len(), 2);
        assert_eq!(cubes["rcp85"].years, vec![1951]);
        assert_eq!(cubes["rcp85"].get(1, 1951, 0), Some(20.0));
        assert!(aggregator.cube("historical").is_some());
        assert_eq!(aggregator.recomputations(), 2);
    }
}
