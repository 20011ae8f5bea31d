//! Parquet persistence for interpolated arrays
//!
//! A per-file array is a `[ntime, 1 + nlocations]` matrix stored as one
//! parquet file: a `time` column followed by `loc_0`, `loc_1`, ... Files
//! are written to a `.partial` sibling and renamed into place, so a crash
//! never leaves a truncated array where the resume check would trust it.

use crate::constants::{LOCATION_COLUMN_PREFIX, PARTIAL_SUFFIX, TIME_COLUMN};
use crate::error::{ExtractError, Result};

use ndarray::Array2;
use polars::prelude::{Column, DataFrame, ParquetReader, ParquetWriter as PolarsParquetWriter, SerReader};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writer for one per-file interpolated array
#[derive(Debug)]
pub struct SeriesWriter {
    output_path: PathBuf,
    overwrite: bool,
}

impl SeriesWriter {
    pub fn new(output_path: PathBuf, overwrite: bool) -> Self {
        Self {
            output_path,
            overwrite,
        }
    }

    /// Write the array, returning the number of rows stored
    pub fn write(&self, series: &Array2<f64>) -> Result<usize> {
        let mut df = series_to_frame(series)?;
        write_parquet_atomic(&self.output_path, &mut df, self.overwrite)?;

        debug!(
            "Wrote {} timesteps x {} locations to {}",
            series.nrows(),
            series.ncols().saturating_sub(1),
            self.output_path.display()
        );
        Ok(df.height())
    }
}

/// Column layout of a per-file array
pub fn series_to_frame(series: &Array2<f64>) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(series.ncols());

    for (j, values) in series.columns().into_iter().enumerate() {
        let name = if j == 0 {
            TIME_COLUMN.to_string()
        } else {
            format!("{}{}", LOCATION_COLUMN_PREFIX, j - 1)
        };
        columns.push(Column::new(name.into(), values.to_vec()));
    }

    Ok(DataFrame::new(columns)?)
}

/// Read a per-file array back into `[ntime, 1 + nlocations]` form
///
/// Column order in the file is authoritative; the first column must be
/// the time column. Nulls read back as NaN.
pub fn read_series(path: &Path) -> Result<Array2<f64>> {
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;

    let columns = df.get_columns();
    match columns.first() {
        Some(first) if first.name().as_str() == TIME_COLUMN => {}
        _ => {
            return Err(ExtractError::persistence(
                path,
                format!("first column is not '{}'", TIME_COLUMN),
            ));
        }
    }

    let mut series = Array2::from_elem((df.height(), columns.len()), f64::NAN);
    for (j, column) in columns.iter().enumerate() {
        let values = column.as_materialized_series().f64()?;
        for (i, value) in values.into_iter().enumerate() {
            series[(i, j)] = value.unwrap_or(f64::NAN);
        }
    }

    Ok(series)
}

/// Sibling path used while a file is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Write a frame to `path` via a partial file and rename
///
/// Refuses to replace an existing file unless `overwrite` is set.
pub fn write_parquet_atomic(path: &Path, df: &mut DataFrame, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(ExtractError::persistence(
            path,
            "output already exists and overwrite is not enabled",
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(path);
    let file = File::create(&partial)?;

    if let Err(e) = PolarsParquetWriter::new(file).finish(df) {
        let _ = fs::remove_file(&partial);
        return Err(ExtractError::persistence(
            path,
            format!("Failed to write parquet: {}", e),
        ));
    }

    fs::rename(&partial, path).map_err(|e| {
        ExtractError::persistence(path, format!("Failed to move partial file into place: {}", e))
    })?;

    Ok(())
}
