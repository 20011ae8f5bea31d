//! Integration tests for the processor module
//!
//! Runs the dispatcher over temporary experiment trees whose source files
//! are served by an in-memory reader.

pub mod error_handling;

use crate::grid::SourceGrid;
use crate::models::{TargetLocation, TargetLocations};
use crate::reader::InMemoryReader;
use ndarray::{Array1, ArrayD, IxDyn};
use std::fs;
use std::path::{Path, PathBuf};

/// Rectilinear 0..360 grid over lat -10..10, lon 0..355 holding one value
pub fn constant_grid(value: f64, ntime: usize) -> SourceGrid {
    let lat = Array1::from_iter((0..=4).map(|i| -10.0 + i as f64 * 5.0));
    let lon = Array1::from_iter((0..72).map(|j| j as f64 * 5.0));
    SourceGrid {
        values: ArrayD::from_elem(IxDyn(&[ntime, lat.len(), lon.len()]), value),
        latitude: lat.into_dyn(),
        longitude: lon.into_dyn(),
        time: Array1::from_iter((0..ntime).map(|t| 15.0 + t as f64 * 30.0)),
    }
}

pub fn test_locations() -> TargetLocations {
    TargetLocations::new(vec![
        TargetLocation::new(-1.3, 36.8),
        TargetLocation::new(6.5, 3.4),
        TargetLocation::new(-4.0, -10.0),
    ])
    .unwrap()
}

/// Create `<root>/<project>/<experiment>/<name>` placeholder files and
/// register a grid for each in the reader
pub fn create_experiment(
    root: &Path,
    project: &str,
    experiment: &str,
    files: &[(&str, SourceGrid)],
    reader: &mut InMemoryReader,
) -> Vec<PathBuf> {
    let dir = root.join(project).join(experiment);
    fs::create_dir_all(&dir).unwrap();

    files
        .iter()
        .map(|(name, grid)| {
            let path = dir.join(name);
            fs::write(&path, "netcdf placeholder").unwrap();
            reader.insert(path.clone(), grid.clone());
            path
        })
        .collect()
}
