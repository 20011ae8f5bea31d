//! Gridded source file reading.
//!
//! The pipeline only needs four named arrays from each source file: the
//! target variable, `lat`, `lon` and `time`. [`GridReader`] is the seam for
//! whatever library provides them. [`NetcdfReader`] uses libnetcdf when the
//! `netcdf` feature is enabled; [`InMemoryReader`] serves prebuilt grids.

use crate::constants::{LATITUDE_VARIABLE, LONGITUDE_VARIABLE, TIME_VARIABLE};
use crate::error::{ExtractError, Result};
use crate::grid::SourceGrid;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("variable '{0}' not found")]
    MissingVariable(String),

    #[error("variable '{name}' holds {len} values but its dimensions are {shape:?}")]
    Shape {
        name: String,
        shape: Vec<usize>,
        len: usize,
    },

    #[error("no grid registered for {0}")]
    UnknownSource(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

/// Source of raw grids, one call per source file
pub trait GridReader: Send + Sync {
    /// Read `variable`, `lat`, `lon` and `time` from the file at `path`
    fn read_grid(&self, path: &Path, variable: &str) -> std::result::Result<SourceGrid, ReadError>;
}

/// Grids held in memory, keyed by source path
///
/// Counts reads so callers can observe how much work a run performed.
#[derive(Debug, Default)]
pub struct InMemoryReader {
    grids: HashMap<PathBuf, SourceGrid>,
    reads: AtomicUsize,
}

impl InMemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(mut self, path: impl Into<PathBuf>, grid: SourceGrid) -> Self {
        self.insert(path, grid);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, grid: SourceGrid) {
        self.grids.insert(path.into(), grid);
    }

    /// Number of successful reads served so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl GridReader for InMemoryReader {
    fn read_grid(&self, path: &Path, _variable: &str) -> std::result::Result<SourceGrid, ReadError> {
        let grid = self
            .grids
            .get(path)
            .cloned()
            .ok_or_else(|| ReadError::UnknownSource(path.to_path_buf()))?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(grid)
    }
}

/// Reader backed by the native NetCDF library
#[cfg(feature = "netcdf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfReader;

#[cfg(feature = "netcdf")]
impl NetcdfReader {
    pub fn new() -> Self {
        Self
    }

    fn read_array(
        file: &netcdf::File,
        name: &str,
    ) -> std::result::Result<ndarray::ArrayD<f64>, ReadError> {
        let var = file
            .variable(name)
            .ok_or_else(|| ReadError::MissingVariable(name.to_string()))?;

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let mut values: Vec<f64> = var.get_values::<f64, _>(..)?;

        let fill_values: Vec<f64> = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|attr| attr_as_f64(&var, attr))
            .collect();
        if !fill_values.is_empty() {
            for v in values.iter_mut() {
                if fill_values.contains(v) {
                    *v = f64::NAN;
                }
            }
        }

        let len = values.len();
        ndarray::ArrayD::from_shape_vec(shape.clone(), values).map_err(|_| ReadError::Shape {
            name: name.to_string(),
            shape,
            len,
        })
    }
}

#[cfg(feature = "netcdf")]
fn attr_as_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    use netcdf::AttributeValue;

    match var.attribute_value(name)?.ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        _ => None,
    }
}

#[cfg(feature = "netcdf")]
impl GridReader for NetcdfReader {
    fn read_grid(&self, path: &Path, variable: &str) -> std::result::Result<SourceGrid, ReadError> {
        let file = netcdf::open(path)?;

        let values = Self::read_array(&file, variable)?;
        let latitude = Self::read_array(&file, LATITUDE_VARIABLE)?;
        let longitude = Self::read_array(&file, LONGITUDE_VARIABLE)?;
        let time = Self::read_array(&file, TIME_VARIABLE)?;

        tracing::debug!(
            "Read {}: {}{:?} lat{:?} lon{:?} time{:?}",
            path.display(),
            variable,
            values.shape(),
            latitude.shape(),
            longitude.shape(),
            time.shape()
        );

        Ok(SourceGrid {
            latitude,
            longitude,
            values,
            time: time.iter().copied().collect(),
        })
    }
}

/// Reader used by the command-line tool
pub fn default_reader() -> Result<Arc<dyn GridReader>> {
    #[cfg(feature = "netcdf")]
    {
        Ok(Arc::new(NetcdfReader::new()))
    }

    #[cfg(not(feature = "netcdf"))]
    {
        Err(ExtractError::configuration(format!(
            "built without NetCDF support; rebuild with `--features netcdf` to read '{}', '{}' and '{}' from source files",
            LATITUDE_VARIABLE, LONGITUDE_VARIABLE, TIME_VARIABLE
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn, array};

    fn tiny_grid() -> SourceGrid {
        SourceGrid {
            latitude: array![0.0, 1.0].into_dyn(),
            longitude: array![10.0, 11.0].into_dyn(),
            values: ArrayD::zeros(IxDyn(&[1, 2, 2])),
            time: array![0.0],
        }
    }

    #[test]
    fn test_in_memory_reader_counts_reads() {
        let reader = InMemoryReader::new().with_grid("/src/a.nc", tiny_grid());

        assert_eq!(reader.reads(), 0);
        let grid = reader.read_grid(Path::new("/src/a.nc"), "tas").unwrap();
        assert_eq!(grid.values.shape(), &[1, 2, 2]);
        assert_eq!(reader.reads(), 1);
    }

    #[test]
    fn test_in_memory_reader_unknown_source() {
        let reader = InMemoryReader::new();
        let err = reader.read_grid(Path::new("/src/missing.nc"), "tas").unwrap_err();
        assert!(matches!(err, ReadError::UnknownSource(_)));
        assert_eq!(reader.reads(), 0);
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn test_default_reader_needs_netcdf_feature() {
        match default_reader() {
            Err(ExtractError::Configuration { message }) => assert!(message.contains("--features netcdf")),
            Err(other) => panic!("Expected Configuration error, got {:?}", other),
            Ok(_) => panic!("Expected Configuration error"),
        }
    }
}
