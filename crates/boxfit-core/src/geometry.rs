//! Yaw-only box geometry.
//!
//! Coordinates follow the camera frame: `x` right, `y` down, `z` forward.
//! Yaw rotates about the vertical `y` axis.
//!
//! The corner template fixes the order in which the 9 box points (8 corners
//! followed by the centroid) are produced. Observed correspondences must be
//! supplied in the same order.
//!
//! ```text
//!              / x
//!             /
//!     z -----
//!            |
//!            | y
//!           2----------3
//!          /|         /|
//!         / |        / |
//!        /  0-------/--1
//!       /  /       /  /
//!      6--/-------7  /
//!      | /        | /
//!      |/         |/
//!      4----------5
//! ```

use serde::{Deserialize, Serialize};

use crate::{CameraIntrinsics, Mat3, Mat3x9, Mat4x3, Pixels2, Points3, Real, Vec2, Vec3};

/// Number of box points (8 corners + centroid).
pub const NUM_BOX_POINTS: usize = 9;

/// Sin/cos magnitudes below this value are snapped to zero.
pub const YAW_SNAP_EPS: Real = 1.0e-3;

/// Depth epsilon added before perspective division.
pub const PROJECTION_EPS: Real = 1.0e-6;

/// Sign pattern of the 9 box points along `(length, height, width)`.
pub const CORNER_TEMPLATE: [[Real; 3]; NUM_BOX_POINTS] = [
    [1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, -1.0, -1.0],
    [0.0, 0.0, 0.0],
];

/// Sign pattern of the 4 corners lying on the height-0 plane.
pub const GROUND_TEMPLATE: [[Real; 3]; 4] = [
    [1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, 1.0],
    [-1.0, 0.0, -1.0],
];

/// Physical box dimensions.
///
/// The pipeline stores dimensions as the triple `(h, w, l)`; use
/// [`BoxDimensions::from_hwl`] and [`BoxDimensions::to_hwl`] to cross that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDimensions {
    /// Extent along the box's local `x` axis.
    pub length: Real,
    /// Extent along the vertical axis.
    pub height: Real,
    /// Extent along the box's local `z` axis.
    pub width: Real,
}

impl BoxDimensions {
    pub fn new(length: Real, height: Real, width: Real) -> Self {
        Self {
            length,
            height,
            width,
        }
    }

    /// Build from the storage triple `[h, w, l]`.
    pub fn from_hwl(hwl: [Real; 3]) -> Self {
        Self::new(hwl[2], hwl[0], hwl[1])
    }

    /// Storage triple `[h, w, l]`.
    pub fn to_hwl(&self) -> [Real; 3] {
        [self.height, self.width, self.length]
    }

    /// Half extents `(l/2, h/2, w/2)` as a diagonal scale.
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width) * 0.5
    }

    /// True if every dimension is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        [self.length, self.height, self.width]
            .iter()
            .all(|d| d.is_finite() && *d > 0.0)
    }
}

/// Rotation about the vertical axis.
///
/// ```text
/// [  c  0  s ]
/// [  0  1  0 ]
/// [ -s  0  c ]
/// ```
pub fn yaw_rotation(yaw: Real) -> Mat3 {
    let (mut s, mut c) = yaw.sin_cos();
    if s.abs() < YAW_SNAP_EPS {
        s = 0.0;
    }
    if c.abs() < YAW_SNAP_EPS {
        c = 0.0;
    }
    Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

fn transform_template<const N: usize>(
    template: &[[Real; 3]; N],
    dim: &BoxDimensions,
    location: &Vec3,
    rotation: &Mat3,
) -> [Vec3; N] {
    let half = dim.half_extents();
    std::array::from_fn(|i| rotation * Vec3::from(template[i]).component_mul(&half) + location)
}

/// Build the 9 box points (columns) in the order of [`CORNER_TEMPLATE`].
pub fn build_corners(dim: &BoxDimensions, location: &Vec3, rotation: &Mat3) -> Mat3x9 {
    let points = transform_template(&CORNER_TEMPLATE, dim, location, rotation);
    Mat3x9::from_columns(&points)
}

/// Build the 4 ground-plane corners, one corner per row.
pub fn build_ground_corners(dim: &BoxDimensions, location: &Vec3, rotation: &Mat3) -> Mat4x3 {
    let points = transform_template(&GROUND_TEMPLATE, dim, location, rotation);
    let rows = points.map(|p| p.transpose());
    Mat4x3::from_rows(&rows)
}

/// Pinhole projection of camera-frame points (columns) into pixels.
///
/// Depth is offset by [`PROJECTION_EPS`] so points near `z = 0` stay finite.
pub fn project(k: &Mat3, points: &Points3) -> Pixels2 {
    let mut pixels = Pixels2::zeros(points.ncols());
    for (i, p) in points.column_iter().enumerate() {
        let h = k * p;
        let z = h.z + PROJECTION_EPS;
        pixels[(0, i)] = h.x / z;
        pixels[(1, i)] = h.y / z;
    }
    pixels
}

/// Project the 9 box points of a posed box into pixels.
pub fn project_box_corners(
    dim: &BoxDimensions,
    location: &Vec3,
    yaw: Real,
    intrinsics: &CameraIntrinsics,
) -> [Vec2; NUM_BOX_POINTS] {
    let corners = build_corners(dim, location, &yaw_rotation(yaw));
    let pixels = project(
        &intrinsics.k_matrix(),
        &Points3::from_iterator(NUM_BOX_POINTS, corners.iter().copied()),
    );
    std::array::from_fn(|i| Vec2::new(pixels[(0, i)], pixels[(1, i)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn approx_eq(a: Real, b: Real, tol: Real) {
        assert!(
            (a - b).abs() <= tol,
            "values differ: {} vs {} (tol={})",
            a,
            b,
            tol
        );
    }

    #[test]
    fn yaw_rotation_reproduces_sin_cos() {
        for i in -40..=40 {
            let yaw = i as Real * 0.08;
            let r = yaw_rotation(yaw);
            approx_eq(r[(0, 0)], yaw.cos(), YAW_SNAP_EPS);
            approx_eq(r[(0, 2)], yaw.sin(), YAW_SNAP_EPS);
            approx_eq(r[(2, 0)], -yaw.sin(), YAW_SNAP_EPS);
            approx_eq(r[(1, 1)], 1.0, 0.0);
        }
    }

    #[test]
    fn yaw_rotation_snaps_axis_aligned_noise() {
        let r = yaw_rotation(FRAC_PI_2);
        assert_eq!(r[(0, 0)], 0.0);
        assert_eq!(r[(0, 2)], 1.0);

        let r = yaw_rotation(PI);
        assert_eq!(r[(0, 2)], 0.0);
        assert_eq!(r[(2, 0)], 0.0);
        assert_eq!(r[(0, 0)], -1.0);
    }

    #[test]
    fn dimensions_storage_mapping() {
        let dim = BoxDimensions::from_hwl([1.5, 1.8, 4.0]);
        assert_eq!(dim.height, 1.5);
        assert_eq!(dim.width, 1.8);
        assert_eq!(dim.length, 4.0);
        assert_eq!(dim.to_hwl(), [1.5, 1.8, 4.0]);
        assert!(dim.is_valid());
        assert!(!BoxDimensions::new(0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn corners_are_centered_on_location() {
        let dim = BoxDimensions::new(4.0, 1.5, 1.8);
        let loc = Vec3::new(1.0, 1.2, 8.0);
        let corners = build_corners(&dim, &loc, &yaw_rotation(0.0));

        assert_eq!(corners.column(8).into_owned(), loc);
        // First corner is (+l/2, +h/2, +w/2).
        approx_eq(corners[(0, 0)], 3.0, 1e-12);
        approx_eq(corners[(1, 0)], 1.95, 1e-12);
        approx_eq(corners[(2, 0)], 8.9, 1e-12);

        let mean = corners.columns(0, 8).column_mean();
        approx_eq((mean - loc).norm(), 0.0, 1e-12);
    }

    #[test]
    fn rotation_preserves_footprint_size() {
        let dim = BoxDimensions::new(4.0, 1.5, 1.8);
        let loc = Vec3::new(0.0, 1.2, 8.0);
        let ground = build_ground_corners(&dim, &loc, &yaw_rotation(0.7));

        for r in 0..4 {
            approx_eq(ground[(r, 1)], 1.2, 1e-12);
        }
        // Rows 0 and 3 are diagonal opposites of the footprint.
        let diag = (ground.row(0) - ground.row(3)).norm();
        approx_eq(diag, (4.0_f64.powi(2) + 1.8_f64.powi(2)).sqrt(), 1e-12);
    }

    #[test]
    fn projection_of_principal_ray_hits_principal_point() {
        let k = Mat3::new(700.0, 0.0, 320.0, 0.0, 700.0, 240.0, 0.0, 0.0, 1.0);
        let pts = Points3::from_columns(&[Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, -0.5, 2.0)]);
        let uv = project(&k, &pts);
        approx_eq(uv[(0, 0)], 320.0, 1e-9);
        approx_eq(uv[(1, 0)], 240.0, 1e-9);
        approx_eq(uv[(0, 1)], 320.0 + 350.0, 1e-3);
        approx_eq(uv[(1, 1)], 240.0 - 175.0, 1e-3);
    }

    #[test]
    fn projection_at_zero_depth_stays_finite() {
        let k = Mat3::identity();
        let uv = project(&k, &Points3::from_columns(&[Vec3::new(1.0, 1.0, 0.0)]));
        assert!(uv.iter().all(|v| v.is_finite()));
    }
}
