//! Grid geometry: normalisation, bounding-box cropping and scattered
//! interpolation of a single source grid onto target locations.
//!
//! The stages run in order for each source file:
//!
//! ```text
//! SourceGrid --normalize--> NormalizedGrid --crop--> CroppedPointCloud
//!            --interpolate_series--> [ntime, 1 + ntargets]
//! ```
//!
//! Every stage is a pure function; file context is attached by the worker.

pub mod crop;
pub mod interpolate;
pub mod normalize;

pub use crop::{BoundingBox, CroppedPointCloud, bounding_box, crop};
pub use interpolate::{PointCloudInterpolator, interpolate_series};
pub use normalize::{NormalizedGrid, normalize, normalize_longitude};

use ndarray::{Array1, ArrayD};
use thiserror::Error;

/// Raw arrays as read from one source file
///
/// `latitude`/`longitude` are either 1D axes of a rectilinear grid or 2D
/// fields of a curvilinear grid. `values` starts with the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGrid {
    pub latitude: ArrayD<f64>,
    pub longitude: ArrayD<f64>,
    pub values: ArrayD<f64>,
    pub time: Array1<f64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("latitude has rank {lat_rank} but longitude has rank {lon_rank}")]
    RankMismatch { lat_rank: usize, lon_rank: usize },

    #[error("unsupported coordinate rank {0}, expected 1 or 2")]
    UnsupportedRank(usize),

    #[error("latitude shape {lat:?} does not match longitude shape {lon:?}")]
    CoordinateShape { lat: Vec<usize>, lon: Vec<usize> },

    #[error("variable shape {shape:?} cannot be arranged as [{ntime}, {ny}, {nx}]")]
    VariableShape {
        shape: Vec<usize>,
        ntime: usize,
        ny: usize,
        nx: usize,
    },

    #[error("grid has no finite {0} coordinates")]
    NoCoordinates(&'static str),

    #[error("bounding box {0} contains no grid points")]
    EmptyCrop(BoundingBox),

    #[error("{0} points are too few to triangulate")]
    TooFewPoints(usize),

    #[error("{0} points are collinear and span no triangle")]
    Degenerate(usize),

    #[error("invalid point coordinate: {0}")]
    InvalidCoordinate(String),
}
