//! Piecewise-linear scattered interpolation.
//!
//! The cropped point cloud is Delaunay-triangulated once per file. Each
//! target is then located in the triangulation and reduced to a stencil of
//! at most three `(point, weight)` pairs, so evaluating a timestep is a
//! weighted sum per target. Targets outside the convex hull yield NaN.

use super::{CroppedPointCloud, GridError};
use crate::models::{TargetLocation, TargetLocations};
use ndarray::{Array2, ArrayView1};
use spade::{DelaunayTriangulation, HasPosition, Point2, PositionInTriangulation, Triangulation};

#[derive(Debug, Clone, Copy)]
struct CloudVertex {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for CloudVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Linear interpolation weights for one target, `None` outside the hull
type Stencil = Option<Vec<(usize, f64)>>;

/// Triangulated point cloud ready for repeated evaluation
pub struct PointCloudInterpolator {
    triangulation: DelaunayTriangulation<CloudVertex>,
    point_count: usize,
}

impl PointCloudInterpolator {
    /// Triangulate `(latitude, longitude)` points
    ///
    /// Points sharing a position are merged, keeping the first.
    pub fn new(points: &[[f64; 2]]) -> Result<Self, GridError> {
        if let Some(bad) = points.iter().find(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(GridError::InvalidCoordinate(format!("({}, {})", bad[0], bad[1])));
        }

        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| {
            points[a][0]
                .total_cmp(&points[b][0])
                .then(points[a][1].total_cmp(&points[b][1]))
                .then(a.cmp(&b))
        });
        order.dedup_by(|a, b| points[*a] == points[*b]);

        if order.len() < 3 {
            return Err(GridError::TooFewPoints(order.len()));
        }

        let vertices: Vec<CloudVertex> = order
            .iter()
            .map(|&index| CloudVertex {
                position: Point2::new(points[index][0], points[index][1]),
                index,
            })
            .collect();

        let triangulation = DelaunayTriangulation::<CloudVertex>::bulk_load(vertices)
            .map_err(|e| GridError::InvalidCoordinate(format!("{:?}", e)))?;

        if triangulation.num_inner_faces() == 0 {
            return Err(GridError::Degenerate(order.len()));
        }

        Ok(Self {
            triangulation,
            point_count: order.len(),
        })
    }

    /// Number of distinct points in the triangulation
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    fn stencil(&self, target: &TargetLocation) -> Stencil {
        let p = Point2::new(target.latitude, target.longitude);

        match self.triangulation.locate(p) {
            PositionInTriangulation::OnVertex(v) => {
                Some(vec![(self.triangulation.vertex(v).data().index, 1.0)])
            }
            PositionInTriangulation::OnEdge(e) => {
                let [a, b] = self.triangulation.directed_edge(e).vertices();
                let (pa, pb) = (a.position(), b.position());
                let (dx, dy) = (pb.x - pa.x, pb.y - pa.y);
                let t = (((p.x - pa.x) * dx + (p.y - pa.y) * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0);
                Some(vec![(a.data().index, 1.0 - t), (b.data().index, t)])
            }
            PositionInTriangulation::OnFace(f) => {
                let [a, b, c] = self.triangulation.face(f).vertices();
                let weights = barycentric_weights(a.position(), b.position(), c.position(), p);
                Some(vec![
                    (a.data().index, weights[0]),
                    (b.data().index, weights[1]),
                    (c.data().index, weights[2]),
                ])
            }
            _ => None,
        }
    }

    /// Weighted stencils for every target, in target order
    fn stencils(&self, targets: &TargetLocations) -> Vec<Stencil> {
        targets.iter().map(|t| self.stencil(t)).collect()
    }

    /// Interpolate one set of point values at every target
    pub fn interpolate(&self, values: ArrayView1<'_, f64>, targets: &TargetLocations) -> Vec<f64> {
        self.stencils(targets)
            .iter()
            .map(|stencil| apply(stencil, values))
            .collect()
    }
}

fn apply(stencil: &Stencil, values: ArrayView1<'_, f64>) -> f64 {
    match stencil {
        Some(weights) => weights.iter().map(|&(i, w)| w * values[i]).sum(),
        None => f64::NAN,
    }
}

fn barycentric_weights(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>, p: Point2<f64>) -> [f64; 3] {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    let wa = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let wb = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    [wa, wb, 1.0 - wa - wb]
}

/// Interpolate every timestep of a cropped cloud onto the targets
///
/// Output row `t` is `[time[t], value@target_0, value@target_1, ...]`.
/// Each timestep is an independent 2D interpolation over the same
/// triangulation.
pub fn interpolate_series(
    cloud: &CroppedPointCloud,
    targets: &TargetLocations,
) -> Result<Array2<f64>, GridError> {
    let interpolator = PointCloudInterpolator::new(&cloud.points)?;
    let stencils = interpolator.stencils(targets);

    let outside = stencils.iter().filter(|s| s.is_none()).count();
    if outside > 0 {
        tracing::debug!(
            "{} of {} targets fall outside the cropped grid and will be NaN",
            outside,
            targets.len()
        );
    }

    let ntime = cloud.time.len();
    let mut series = Array2::from_elem((ntime, 1 + targets.len()), f64::NAN);

    for (t, mut row) in series.outer_iter_mut().enumerate() {
        let step = cloud.values.row(t);
        row[0] = cloud.time[t];
        for (k, stencil) in stencils.iter().enumerate() {
            row[k + 1] = apply(stencil, step);
        }
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BoundingBox;
    use ndarray::{Array1, array};

    const EPS: f64 = 1e-9;

    fn unit_box() -> BoundingBox {
        BoundingBox {
            lat_min: 0.0,
            lat_max: 2.0,
            lon_min: 0.0,
            lon_max: 2.0,
        }
    }

    /// 3x3 grid on [0, 2]^2 with two timesteps: value = a*lat + b*lon + c
    fn linear_cloud() -> CroppedPointCloud {
        let mut points = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                points.push([i as f64, j as f64]);
            }
        }
        let values = Array2::from_shape_fn((2, points.len()), |(t, k)| {
            let [lat, lon] = points[k];
            if t == 0 { 2.0 * lat + 3.0 * lon + 1.0 } else { -lat + 0.5 * lon }
        });
        CroppedPointCloud {
            points,
            values,
            time: array![15.0, 45.0],
            bounds: unit_box(),
        }
    }

    fn targets(points: &[(f64, f64)]) -> TargetLocations {
        TargetLocations::new(
            points
                .iter()
                .map(|&(lat, lon)| TargetLocation::new(lat, lon))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_linear_field_is_reproduced() {
        let cloud = linear_cloud();
        let t = targets(&[(0.25, 1.5), (1.0, 1.0), (2.0, 0.3), (1.7, 0.9)]);
        let series = interpolate_series(&cloud, &t).unwrap();

        assert_eq!(series.dim(), (2, 5));
        assert_eq!(series.column(0).to_vec(), vec![15.0, 45.0]);

        for (k, loc) in t.iter().enumerate() {
            let (lat, lon) = (loc.latitude, loc.longitude);
            assert!((series[(0, k + 1)] - (2.0 * lat + 3.0 * lon + 1.0)).abs() < EPS);
            assert!((series[(1, k + 1)] - (-lat + 0.5 * lon)).abs() < EPS);
        }
    }

    #[test]
    fn test_outside_hull_is_nan() {
        let cloud = linear_cloud();
        let series = interpolate_series(&cloud, &targets(&[(5.0, 5.0), (1.0, 1.0)])).unwrap();

        assert!(series[(0, 1)].is_nan());
        assert!(series[(1, 1)].is_nan());
        assert!(series[(0, 2)].is_finite());
    }

    #[test]
    fn test_nan_values_propagate() {
        let mut cloud = linear_cloud();
        cloud.values.row_mut(1).fill(f64::NAN);
        let series = interpolate_series(&cloud, &targets(&[(1.5, 1.5)])).unwrap();

        assert!(series[(0, 1)].is_finite());
        assert!(series[(1, 1)].is_nan());
    }

    #[test]
    fn test_duplicate_points_are_merged() {
        let points = vec![[0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let interpolator = PointCloudInterpolator::new(&points).unwrap();
        assert_eq!(interpolator.point_count(), 4);

        let values = Array1::from_vec(vec![1.0, 99.0, 1.0, 1.0, 1.0]);
        let out = interpolator.interpolate(values.view(), &targets(&[(0.5, 0.5)]));
        assert!((out[0] - 1.0).abs() < EPS);
    }

    #[test]
    fn test_degenerate_clouds_are_errors() {
        assert_eq!(
            PointCloudInterpolator::new(&[[0.0, 0.0], [1.0, 1.0]]).err(),
            Some(GridError::TooFewPoints(2))
        );
        assert_eq!(
            PointCloudInterpolator::new(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]).err(),
            Some(GridError::Degenerate(4))
        );
        assert!(matches!(
            PointCloudInterpolator::new(&[[0.0, f64::NAN], [1.0, 1.0], [2.0, 0.0]]),
            Err(GridError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_zero_timesteps() {
        let mut cloud = linear_cloud();
        cloud.values = Array2::zeros((0, cloud.points.len()));
        cloud.time = Array1::zeros(0);

        let series = interpolate_series(&cloud, &targets(&[(1.0, 1.0)])).unwrap();
        assert_eq!(series.dim(), (0, 2));
    }
}
