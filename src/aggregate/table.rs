//! Long-form tables and the seasonal reduction
//!
//! Each per-file array is unrolled into rows of
//! `(year, month, location, model, temperature)`. All rows of an experiment
//! are concatenated lazily, filtered to winter months and averaged per
//! `(location, year, model)`.

use super::dates::{is_winter_month, year_month};
use crate::error::{ExtractError, Result};
use crate::models::{ModelIdentity, SeasonalCube};

use ndarray::{Array2, Array3};
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const LOCATION: &str = "location";
pub const MODEL: &str = "model";
pub const TEMPERATURE: &str = "temperature";

/// Unroll one per-file array into long form, location-major
pub fn series_to_long(series: &Array2<f64>, model_id: i64, path: &Path) -> Result<DataFrame> {
    let (ntime, ncols) = series.dim();
    let nloc = ncols.saturating_sub(1);

    let months = series
        .column(0)
        .iter()
        .map(|&offset| {
            year_month(offset).ok_or_else(|| ExtractError::InvalidTimeOffset {
                path: path.to_path_buf(),
                value: offset,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let capacity = ntime * nloc;
    let mut years = Vec::with_capacity(capacity);
    let mut month_numbers = Vec::with_capacity(capacity);
    let mut locations = Vec::with_capacity(capacity);
    let mut temperatures = Vec::with_capacity(capacity);

    for l in 0..nloc {
        for (t, &(year, month)) in months.iter().enumerate() {
            years.push(year);
            month_numbers.push(month as i32);
            locations.push(l as i64);
            temperatures.push(series[(t, l + 1)]);
        }
    }

    Ok(df!(
        YEAR => years,
        MONTH => month_numbers,
        LOCATION => locations,
        MODEL => vec![model_id; capacity],
        TEMPERATURE => temperatures,
    )?)
}

fn winter_filter() -> Expr {
    (1..=12)
        .filter(|&m| is_winter_month(m))
        .map(|m| col(MONTH).eq(lit(m as i32)))
        .reduce(|acc, e| acc.or(e))
        .unwrap_or(lit(false))
}

/// Winter mean per `(location, year, model)` over all concatenated rows
pub fn winter_means(frames: Vec<LazyFrame>) -> Result<DataFrame> {
    let combined = concat(frames, UnionArgs::default())?;

    Ok(combined
        .filter(winter_filter())
        .group_by([col(LOCATION), col(YEAR), col(MODEL)])
        .agg([col(TEMPERATURE).mean()])
        .collect()?)
}

/// Scatter grouped means into a `[location, year, model]` cube
///
/// Axes hold the sorted distinct values present in `grouped`; cells with
/// no group stay NaN. `names` maps model ids to labels.
pub fn build_cube(grouped: &DataFrame, names: &HashMap<i64, String>) -> Result<SeasonalCube> {
    let locations_col = grouped.column(LOCATION)?.as_materialized_series().i64()?;
    let years_col = grouped.column(YEAR)?.as_materialized_series().i32()?;
    let models_col = grouped.column(MODEL)?.as_materialized_series().i64()?;
    let temps_col = grouped.column(TEMPERATURE)?.as_materialized_series().f64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for (((l, y), m), t) in locations_col
        .into_iter()
        .zip(years_col)
        .zip(models_col)
        .zip(temps_col)
    {
        if let (Some(l), Some(y), Some(m)) = (l, y, m) {
            rows.push((l, y, m, t.unwrap_or(f64::NAN)));
        }
    }

    let locations: Vec<i64> = rows.iter().map(|r| r.0).collect::<BTreeSet<_>>().into_iter().collect();
    let years: Vec<i32> = rows.iter().map(|r| r.1).collect::<BTreeSet<_>>().into_iter().collect();
    let model_ids: Vec<i64> = rows.iter().map(|r| r.2).collect::<BTreeSet<_>>().into_iter().collect();

    let mut temps = Array3::from_elem((locations.len(), years.len(), model_ids.len()), f64::NAN);
    for (l, y, m, t) in rows {
        if let (Ok(li), Ok(yi), Ok(mi)) = (
            locations.binary_search(&l),
            years.binary_search(&y),
            model_ids.binary_search(&m),
        ) {
            temps[(li, yi, mi)] = t;
        }
    }

    let models = model_ids
        .iter()
        .map(|id| {
            names
                .get(id)
                .cloned()
                .unwrap_or_else(|| ModelIdentity::placeholder(*id).into_string())
        })
        .collect();

    Ok(SeasonalCube {
        models,
        years,
        locations,
        temps,
    })
}
