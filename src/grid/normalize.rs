//! Grid convention normalisation.
//!
//! Climate models ship either rectilinear grids (1D `lat`, 1D `lon`) or
//! curvilinear grids (2D `lat`/`lon` fields), with longitudes in either
//! 0..360 or -180..180. Everything downstream sees one layout: 2D
//! coordinate fields of identical shape, longitudes in -180..180 and values
//! arranged `[time, ny, nx]`.

use super::{GridError, SourceGrid};
use ndarray::{Array1, Array2, Array3, ArrayD, Ix1, Ix2};
use tracing::debug;

/// Grid in canonical layout
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGrid {
    /// `[ny, nx]`
    pub latitude: Array2<f64>,
    /// `[ny, nx]`, in -180..180
    pub longitude: Array2<f64>,
    /// `[time, ny, nx]`
    pub values: Array3<f64>,
    pub time: Array1<f64>,
}

/// Map a 0..360 longitude into -180..180
pub fn normalize_longitude(longitude: f64) -> f64 {
    if longitude >= 180.0 {
        longitude - 360.0
    } else {
        longitude
    }
}

/// Bring a raw grid into canonical layout
pub fn normalize(grid: SourceGrid) -> Result<NormalizedGrid, GridError> {
    let SourceGrid {
        latitude,
        longitude,
        values,
        time,
    } = grid;

    let longitude = longitude.mapv_into(normalize_longitude);

    let (latitude, longitude) = match (latitude.ndim(), longitude.ndim()) {
        (1, 1) => {
            let lat = into_rank::<Ix1>(latitude)?;
            let lon = into_rank::<Ix1>(longitude)?;
            expand_rectilinear(&lat, &lon)
        }
        (2, 2) => (into_rank::<Ix2>(latitude)?, into_rank::<Ix2>(longitude)?),
        (lat_rank, lon_rank) if lat_rank != lon_rank => {
            return Err(GridError::RankMismatch { lat_rank, lon_rank });
        }
        (rank, _) => return Err(GridError::UnsupportedRank(rank)),
    };

    if latitude.dim() != longitude.dim() {
        return Err(GridError::CoordinateShape {
            lat: latitude.shape().to_vec(),
            lon: longitude.shape().to_vec(),
        });
    }

    let (ny, nx) = latitude.dim();
    let values = arrange_values(values, time.len(), ny, nx)?;

    debug!(
        "Normalized grid: {} timesteps on {}x{} points",
        time.len(),
        ny,
        nx
    );

    Ok(NormalizedGrid {
        latitude,
        longitude,
        values,
        time,
    })
}

/// Outer-product expansion of 1D axes into `[nlat, nlon]` fields
///
/// Cell `(i, j)` holds `(lat[i], lon[j])`, matching values laid out
/// `[time, lat, lon]`.
pub fn expand_rectilinear(lat: &Array1<f64>, lon: &Array1<f64>) -> (Array2<f64>, Array2<f64>) {
    let shape = (lat.len(), lon.len());
    let lat2 = Array2::from_shape_fn(shape, |(i, _)| lat[i]);
    let lon2 = Array2::from_shape_fn(shape, |(_, j)| lon[j]);
    (lat2, lon2)
}

fn into_rank<D: ndarray::Dimension>(
    array: ArrayD<f64>,
) -> Result<ndarray::Array<f64, D>, GridError> {
    let rank = array.ndim();
    array
        .into_dimensionality::<D>()
        .map_err(|_| GridError::UnsupportedRank(rank))
}

/// Arrange values as `[time, ny, nx]`
///
/// Extra singleton axes (e.g. a height level) are folded away; the leading
/// axis must be time and the element count must match.
fn arrange_values(
    values: ArrayD<f64>,
    ntime: usize,
    ny: usize,
    nx: usize,
) -> Result<Array3<f64>, GridError> {
    let shape_error = |values: &ArrayD<f64>| GridError::VariableShape {
        shape: values.shape().to_vec(),
        ntime,
        ny,
        nx,
    };

    let leading = values.shape().first().copied();
    if leading != Some(ntime) || values.len() != ntime * ny * nx {
        return Err(shape_error(&values));
    }

    let flat: Vec<f64> = values.iter().copied().collect();
    Array3::from_shape_vec((ntime, ny, nx), flat).map_err(|_| shape_error(&values))
}
