//! Persisted seasonal cubes
//!
//! A cube is stored in long form, one row per cell, so the parquet file is
//! self-describing and NaN cells survive the round trip.

use crate::error::{ExtractError, Result};
use crate::models::SeasonalCube;
use crate::processor::writer::write_parquet_atomic;

use ndarray::Array3;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

const LOCATION: &str = "location";
const YEAR: &str = "year";
const MODEL_ID: &str = "model_id";
const MODEL: &str = "model";
const TEMPERATURE: &str = "temperature";

/// Write a cube, replacing any previous cache file
pub fn write_cube(path: &Path, cube: &SeasonalCube) -> Result<()> {
    let cells = cube.temps.len();
    let mut locations = Vec::with_capacity(cells);
    let mut years = Vec::with_capacity(cells);
    let mut model_ids = Vec::with_capacity(cells);
    let mut models = Vec::with_capacity(cells);
    let mut temperatures = Vec::with_capacity(cells);

    for ((l, y, m), &t) in cube.temps.indexed_iter() {
        locations.push(cube.locations[l]);
        years.push(cube.years[y]);
        model_ids.push(m as i64);
        models.push(cube.models[m].clone());
        temperatures.push(t);
    }

    let mut df = df!(
        LOCATION => locations,
        YEAR => years,
        MODEL_ID => model_ids,
        MODEL => models,
        TEMPERATURE => temperatures,
    )?;

    write_parquet_atomic(path, &mut df, true)?;
    debug!("Cached {} cube cells at {}", cells, path.display());
    Ok(())
}

/// Rebuild a cube from its cache file
pub fn read_cube(path: &Path) -> Result<SeasonalCube> {
    let df = ParquetReader::new(File::open(path)?).finish()?;

    let locations_col = df.column(LOCATION)?.as_materialized_series().i64()?;
    let years_col = df.column(YEAR)?.as_materialized_series().i32()?;
    let ids_col = df.column(MODEL_ID)?.as_materialized_series().i64()?;
    let models_col = df.column(MODEL)?.as_materialized_series().str()?;
    let temps_col = df.column(TEMPERATURE)?.as_materialized_series().f64()?;

    let malformed = || ExtractError::persistence(path, "malformed cube cache");

    let mut cells = Vec::with_capacity(df.height());
    let mut locations = BTreeSet::new();
    let mut years = BTreeSet::new();
    let mut models: Vec<Option<String>> = Vec::new();

    for ((((l, y), id), name), t) in locations_col
        .into_iter()
        .zip(years_col)
        .zip(ids_col)
        .zip(models_col)
        .zip(temps_col)
    {
        let (Some(l), Some(y), Some(id), Some(name)) = (l, y, id, name) else {
            return Err(malformed());
        };
        let index = usize::try_from(id).map_err(|_| malformed())?;
        if models.len() <= index {
            models.resize(index + 1, None);
        }
        models[index].get_or_insert_with(|| name.to_string());

        locations.insert(l);
        years.insert(y);
        cells.push((l, y, index, t.unwrap_or(f64::NAN)));
    }

    let models: Vec<String> = models
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(malformed)?;
    let locations: Vec<i64> = locations.into_iter().collect();
    let years: Vec<i32> = years.into_iter().collect();

    let shape = (locations.len(), years.len(), models.len());
    if cells.len() != shape.0 * shape.1 * shape.2 {
        return Err(malformed());
    }

    let mut temps = Array3::from_elem(shape, f64::NAN);
    for (l, y, m, t) in cells {
        let li = locations.binary_search(&l).map_err(|_| malformed())?;
        let yi = years.binary_search(&y).map_err(|_| malformed())?;
        temps[(li, yi, m)] = t;
    }

    Ok(SeasonalCube {
        models,
        years,
        locations,
        temps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn sample_cube() -> SeasonalCube {
        SeasonalCube {
            models: vec!["A_X".to_string(), "B_Y".to_string()],
            years: vec![1950, 1951],
            locations: vec![0, 1],
            temps: array![
                [[280.0, 281.5], [f64::NAN, 282.25]],
                [[290.0, 0.1], [-3.0, f64::NAN]]
            ],
        }
    }

    fn bits(cube: &SeasonalCube) -> Vec<u64> {
        cube.temps.iter().map(|v| v.to_bits()).collect()
    }

    #[test]
    fn test_cube_cache_is_exact() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("winter.parquet");
        let cube = sample_cube();

        write_cube(&path, &cube).unwrap();
        let read = read_cube(&path).unwrap();

        assert_eq!(read.models, cube.models);
        assert_eq!(read.years, cube.years);
        assert_eq!(read.locations, cube.locations);
        assert_eq!(bits(&read), bits(&cube));
    }

    #[test]
    fn test_empty_cube() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("winter.parquet");

        write_cube(&path, &SeasonalCube::empty()).unwrap();
        let read = read_cube(&path).unwrap();

        assert!(read.models.is_empty());
        assert_eq!(read.temps.len(), 0);
    }

    #[test]
    fn test_cache_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("winter.parquet");

        write_cube(&path, &sample_cube()).unwrap();
        write_cube(&path, &SeasonalCube::empty()).unwrap();
        assert!(read_cube(&path).unwrap().years.is_empty());
    }
}
