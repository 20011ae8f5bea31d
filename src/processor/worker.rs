//! Per-file interpolation pipeline
//!
//! Runs on a blocking thread: load, normalise, crop, interpolate and write
//! one source file. Every failure is logged with the unit's context and the
//! shapes seen so far, then returned tagged with its stage.

use crate::error::{ExtractError, Result};
use crate::grid::{SourceGrid, crop, interpolate_series, normalize};
use crate::models::WorkUnit;
use crate::reader::GridReader;

use super::writer::SeriesWriter;
use tracing::{error, info};

/// Shapes of a raw grid, for diagnostics
fn describe(grid: &SourceGrid) -> String {
    format!(
        "lat {:?}, lon {:?}, values {:?}, time [{}]",
        grid.latitude.shape(),
        grid.longitude.shape(),
        grid.values.shape(),
        grid.time.len()
    )
}

fn context(unit: &WorkUnit) -> String {
    format!(
        "unit {} (source: {}, output: {}, variable: {}, {} locations, overwrite: {})",
        unit.id,
        unit.source.display(),
        unit.output.display(),
        unit.variable,
        unit.locations.len(),
        unit.overwrite
    )
}

/// Process one unit of work, returning the number of timesteps written
pub fn process_unit(reader: &dyn GridReader, unit: &WorkUnit) -> Result<usize> {
    info!("File {}: opening {}", unit.id, unit.source.display());

    let grid = reader
        .read_grid(&unit.source, &unit.variable)
        .map_err(|source| {
            error!("Error loading {}: {}", context(unit), source);
            ExtractError::Load {
                path: unit.source.clone(),
                unit_id: unit.id,
                source,
            }
        })?;

    let shapes = describe(&grid);

    let normalized = normalize(grid).map_err(|source| {
        error!("Error reshaping {} [{}]: {}", context(unit), shapes, source);
        ExtractError::Reshape {
            path: unit.source.clone(),
            unit_id: unit.id,
            source,
        }
    })?;

    let cloud = crop(&normalized, &unit.locations).map_err(|source| {
        error!("Error cropping {} [{}]: {}", context(unit), shapes, source);
        ExtractError::Crop {
            path: unit.source.clone(),
            unit_id: unit.id,
            source,
        }
    })?;

    info!(
        "File {}: performing interpolations ({} points, {} timesteps)",
        unit.id,
        cloud.points.len(),
        cloud.time.len()
    );

    let series = interpolate_series(&cloud, &unit.locations).map_err(|source| {
        error!(
            "Error interpolating {} [{}, cropped to {}]: {}",
            context(unit),
            shapes,
            cloud.bounds,
            source
        );
        ExtractError::Interpolation {
            path: unit.source.clone(),
            unit_id: unit.id,
            source,
        }
    })?;

    info!("File {}: writing {}", unit.id, unit.output.display());

    SeriesWriter::new(unit.output.clone(), unit.overwrite)
        .write(&series)
        .inspect_err(|e| error!("Error writing {}: {}", context(unit), e))
}
