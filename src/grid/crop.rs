//! Bounding-box cropping.
//!
//! The grid is cut down to the smallest box around the targets, padded by
//! one grid step on each side so that every target stays bracketed.

use super::{GridError, NormalizedGrid};
use crate::models::TargetLocations;
use ndarray::{Array1, Array2, Axis};
use std::fmt;
use tracing::debug;

/// Inclusive latitude/longitude box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lat [{}, {}] x lon [{}, {}]",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}

/// Grid points inside the bounding box, flattened
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedPointCloud {
    /// `(latitude, longitude)` per kept point
    pub points: Vec<[f64; 2]>,
    /// `[time, point]`
    pub values: Array2<f64>,
    pub time: Array1<f64>,
    pub bounds: BoundingBox,
}

/// Padded bounds along one axis
///
/// Returns the largest grid value strictly below `target_min` and the
/// smallest strictly above `target_max`. When no such value exists the
/// bound clamps to the grid extreme on that side.
pub fn padded_bounds(
    coords: &Array2<f64>,
    target_min: f64,
    target_max: f64,
    axis: &'static str,
) -> Result<(f64, f64), GridError> {
    let mut unique: Vec<f64> = coords.iter().copied().filter(|v| v.is_finite()).collect();
    if unique.is_empty() {
        return Err(GridError::NoCoordinates(axis));
    }
    unique.sort_by(f64::total_cmp);
    unique.dedup();

    let below = unique.partition_point(|&v| v < target_min);
    let lower = if below == 0 {
        unique[0]
    } else {
        unique[below - 1]
    };

    let above = unique.partition_point(|&v| v <= target_max);
    let upper = unique
        .get(above)
        .copied()
        .unwrap_or(unique[unique.len() - 1]);

    Ok((lower, upper))
}

/// Bounding box of the targets, padded by one grid step per side
pub fn bounding_box(
    grid: &NormalizedGrid,
    targets: &TargetLocations,
) -> Result<BoundingBox, GridError> {
    let (lat_lo, lat_hi) = targets.latitude_range();
    let (lon_lo, lon_hi) = targets.longitude_range();

    let (lat_min, lat_max) = padded_bounds(&grid.latitude, lat_lo, lat_hi, "latitude")?;
    let (lon_min, lon_max) = padded_bounds(&grid.longitude, lon_lo, lon_hi, "longitude")?;

    Ok(BoundingBox {
        lat_min,
        lat_max,
        lon_min,
        lon_max,
    })
}

/// Keep only the grid points inside the padded target box
pub fn crop(grid: &NormalizedGrid, targets: &TargetLocations) -> Result<CroppedPointCloud, GridError> {
    let bounds = bounding_box(grid, targets)?;

    let (ntime, ny, nx) = grid.values.dim();
    let mut kept = Vec::new();
    let mut points = Vec::new();

    for (index, (&lat, &lon)) in grid.latitude.iter().zip(grid.longitude.iter()).enumerate() {
        if bounds.contains(lat, lon) {
            kept.push(index);
            points.push([lat, lon]);
        }
    }

    if kept.is_empty() {
        return Err(GridError::EmptyCrop(bounds));
    }

    let flat = grid
        .values
        .to_shape((ntime, ny * nx))
        .map_err(|_| GridError::VariableShape {
            shape: grid.values.shape().to_vec(),
            ntime,
            ny,
            nx,
        })?;
    let values = flat.select(Axis(1), &kept);

    debug!(
        "Cropped {} of {} grid points to {}",
        kept.len(),
        ny * nx,
        bounds
    );

    Ok(CroppedPointCloud {
        points,
        values,
        time: grid.time.clone(),
        bounds,
    })
}
