//! Reprojection objective over the 8-parameter box pose.
//!
//! The pose vector is `x = [s, c, l, h, w, tx, ty, tz]` where `(s, c)` stand in
//! for `(sin(yaw), cos(yaw))`. For a template sign triple `σ` scaled by one half,
//! the camera-frame point is
//!
//! ```text
//! xc =  σx·l·c + σz·w·s + tx
//! yc =  σy·h           + ty
//! zc = -σx·l·s + σz·w·c + tz
//! ```
//!
//! which is `R(yaw) · diag(l, h, w) · σ + t` unrolled, so no matrix is built per
//! correspondence. The residual is the summed squared pixel error over all 9
//! points and both image axes.

use boxfit_core::{
    BoxDimensions, Box3D, CameraIntrinsics, Real, Vec2, Vec3, CORNER_TEMPLATE, NUM_BOX_POINTS,
};
use nalgebra::DVector;

use crate::traits::GradientProblem;

/// Depth epsilon used by the objective's perspective division.
pub const OBJECTIVE_DEPTH_EPS: Real = 1.0e-4;

/// Length of the pose vector.
pub const NUM_POSE_PARAMS: usize = 8;

/// Raw pose parameters in solver order.
pub type PoseParams = [Real; NUM_POSE_PARAMS];

/// Box pose as seen by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseVector {
    pub sin_yaw: Real,
    pub cos_yaw: Real,
    pub length: Real,
    pub height: Real,
    pub width: Real,
    pub location: Vec3,
}

impl PoseVector {
    pub const SIN: usize = 0;
    pub const COS: usize = 1;
    pub const LENGTH: usize = 2;
    pub const HEIGHT: usize = 3;
    pub const WIDTH: usize = 4;
    pub const TX: usize = 5;
    pub const TY: usize = 6;
    pub const TZ: usize = 7;

    /// Zero-yaw pose at the given prior dimensions and location.
    pub fn from_prior(dim: &BoxDimensions, location: &Vec3) -> Self {
        Self {
            sin_yaw: 0.0,
            cos_yaw: 1.0,
            length: dim.length,
            height: dim.height,
            width: dim.width,
            location: *location,
        }
    }

    pub fn from_params(x: &PoseParams) -> Self {
        Self {
            sin_yaw: x[Self::SIN],
            cos_yaw: x[Self::COS],
            length: x[Self::LENGTH],
            height: x[Self::HEIGHT],
            width: x[Self::WIDTH],
            location: Vec3::new(x[Self::TX], x[Self::TY], x[Self::TZ]),
        }
    }

    pub fn to_params(&self) -> PoseParams {
        [
            self.sin_yaw,
            self.cos_yaw,
            self.length,
            self.height,
            self.width,
            self.location.x,
            self.location.y,
            self.location.z,
        ]
    }

    pub fn from_dvector(x: &DVector<Real>) -> Self {
        Self::from_params(&params_from_dvector(x))
    }

    pub fn to_dvector(&self) -> DVector<Real> {
        DVector::from_row_slice(&self.to_params())
    }

    /// `atan2(s, c)`; well defined even when `(s, c)` is off the unit circle.
    pub fn yaw(&self) -> Real {
        self.sin_yaw.atan2(self.cos_yaw)
    }

    pub fn dimensions(&self) -> BoxDimensions {
        BoxDimensions::new(self.length, self.height, self.width)
    }

    /// Retract `(s, c)` onto the unit circle.
    ///
    /// The objective only sees the products `l·(s, c)` and `w·(s, c)`, so with
    /// `r = hypot(s, c)` the map `(s, c, l, w) -> (s/r, c/r, l·r, w·r)` leaves
    /// every projected point unchanged. Returns `None` when `r` is zero or not finite.
    pub fn on_unit_circle(&self) -> Option<Self> {
        let r = self.sin_yaw.hypot(self.cos_yaw);
        if !r.is_finite() || r <= Real::EPSILON {
            return None;
        }
        Some(Self {
            sin_yaw: self.sin_yaw / r,
            cos_yaw: self.cos_yaw / r,
            length: self.length * r,
            height: self.height,
            width: self.width * r,
            location: self.location,
        })
    }

    pub fn to_box(&self) -> Box3D {
        Box3D::new(self.dimensions(), self.yaw(), self.location)
    }
}

pub(crate) fn params_from_dvector(x: &DVector<Real>) -> PoseParams {
    debug_assert_eq!(x.len(), NUM_POSE_PARAMS);
    std::array::from_fn(|i| x[i])
}

#[inline]
fn half_sign(point_idx: usize) -> [Real; 3] {
    CORNER_TEMPLATE[point_idx].map(|s| 0.5 * s)
}

#[inline]
fn camera_point(x: &PoseParams, sigma: &[Real; 3]) -> (Real, Real, Real) {
    let [s, c, l, h, w, tx, ty, tz] = *x;
    let xc = sigma[0] * l * c + sigma[2] * w * s + tx;
    let yc = sigma[1] * h + ty;
    let zc = -sigma[0] * l * s + sigma[2] * w * c + tz;
    (xc, yc, zc)
}

/// Summed squared reprojection error of the 9 box points.
pub fn residual(
    x: &PoseParams,
    intrinsics: &CameraIntrinsics,
    observed: &[Vec2; NUM_BOX_POINTS],
) -> Real {
    let k = intrinsics;
    let mut cost = 0.0;
    for (i, uv) in observed.iter().enumerate() {
        let (xc, yc, zc) = camera_point(x, &half_sign(i));
        let z = zc + OBJECTIVE_DEPTH_EPS;
        let eu = xc * k.fx / z + k.cx - uv.x;
        let ev = yc * k.fy / z + k.cy - uv.y;
        cost += eu * eu + ev * ev;
    }
    cost
}

/// Residual and its analytic gradient in a single pass.
///
/// With `z = zc + eps`, `u = fx·xc/z + cx` and `∂u/∂p = fx·(∂xc/∂p·z - xc·∂zc/∂p) / z²`;
/// likewise for `v`.
pub fn value_and_gradient(
    x: &PoseParams,
    intrinsics: &CameraIntrinsics,
    observed: &[Vec2; NUM_BOX_POINTS],
) -> (Real, PoseParams) {
    let k = intrinsics;
    let [s, c, l, _h, w, _tx, _ty, _tz] = *x;
    let mut cost = 0.0;
    let mut grad = [0.0; NUM_POSE_PARAMS];

    for (i, uv) in observed.iter().enumerate() {
        let sigma = half_sign(i);
        let (xc, yc, zc) = camera_point(x, &sigma);
        let z = zc + OBJECTIVE_DEPTH_EPS;
        let eu = xc * k.fx / z + k.cx - uv.x;
        let ev = yc * k.fy / z + k.cy - uv.y;
        cost += eu * eu + ev * ev;

        let [sx, sy, sz] = sigma;
        let dxc = [sz * w, sx * l, sx * c, 0.0, sz * s, 1.0, 0.0, 0.0];
        let dyc = [0.0, 0.0, 0.0, sy, 0.0, 0.0, 1.0, 0.0];
        let dzc = [-sx * l, sz * w, -sx * s, 0.0, sz * c, 0.0, 0.0, 1.0];

        let z2 = z * z;
        for p in 0..NUM_POSE_PARAMS {
            let du = k.fx * (dxc[p] * z - xc * dzc[p]) / z2;
            let dv = k.fy * (dyc[p] * z - yc * dzc[p]) / z2;
            grad[p] += 2.0 * (eu * du + ev * dv);
        }
    }

    (cost, grad)
}

/// Analytic gradient of [`residual`].
pub fn gradient(
    x: &PoseParams,
    intrinsics: &CameraIntrinsics,
    observed: &[Vec2; NUM_BOX_POINTS],
) -> PoseParams {
    value_and_gradient(x, intrinsics, observed).1
}

/// Reprojection objective for a single box instance.
#[derive(Debug, Clone)]
pub struct ReprojectionObjective {
    pub intrinsics: CameraIntrinsics,
    pub observed: [Vec2; NUM_BOX_POINTS],
}

impl ReprojectionObjective {
    pub fn new(intrinsics: CameraIntrinsics, observed: [Vec2; NUM_BOX_POINTS]) -> Self {
        Self {
            intrinsics,
            observed,
        }
    }

    pub fn residual(&self, x: &PoseParams) -> Real {
        residual(x, &self.intrinsics, &self.observed)
    }

    pub fn gradient(&self, x: &PoseParams) -> PoseParams {
        gradient(x, &self.intrinsics, &self.observed)
    }

    /// Combined evaluator returning `(value, gradient)`.
    pub fn combined(&self, x: &PoseParams) -> (Real, PoseParams) {
        value_and_gradient(x, &self.intrinsics, &self.observed)
    }
}

impl GradientProblem for ReprojectionObjective {
    fn num_params(&self) -> usize {
        NUM_POSE_PARAMS
    }

    fn value(&self, x: &DVector<Real>) -> Real {
        self.residual(&params_from_dvector(x))
    }

    fn gradient(&self, x: &DVector<Real>) -> DVector<Real> {
        DVector::from_row_slice(&ReprojectionObjective::gradient(
            self,
            &params_from_dvector(x),
        ))
    }

    fn value_and_gradient(&self, x: &DVector<Real>) -> (Real, DVector<Real>) {
        let (f, g) = self.combined(&params_from_dvector(x));
        (f, DVector::from_row_slice(&g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxfit_core::{build_corners, project, yaw_rotation, Points3};

    fn kitti_k() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 700.0,
            fy: 700.0,
            cx: 320.0,
            cy: 240.0,
        }
    }

    fn truth() -> Box3D {
        Box3D::new(
            BoxDimensions::from_hwl([1.5, 1.8, 4.0]),
            0.3,
            Vec3::new(0.0, 1.2, 8.0),
        )
    }

    fn truth_params(b: &Box3D) -> PoseParams {
        let (s, c) = b.yaw.sin_cos();
        let d = b.dimensions;
        [
            s,
            c,
            d.length,
            d.height,
            d.width,
            b.location.x,
            b.location.y,
            b.location.z,
        ]
    }

    #[test]
    fn residual_vanishes_at_ground_truth() {
        let b = truth();
        let x = truth_params(&b);
        let k = kitti_k();
        let observed: [Vec2; NUM_BOX_POINTS] = std::array::from_fn(|i| {
            let (xc, yc, zc) = camera_point(&x, &half_sign(i));
            let z = zc + OBJECTIVE_DEPTH_EPS;
            Vec2::new(k.fx * xc / z + k.cx, k.fy * yc / z + k.cy)
        });
        let cost = residual(&x, &k, &observed);
        assert!(cost < 1e-18, "cost at truth {cost}");
        assert!(gradient(&x, &k, &observed).iter().all(|g| g.abs() < 1e-6));

        // Geometry projects with a smaller depth epsilon; the mismatch stays far below
        // the acceptance threshold.
        let cost = residual(&x, &k, &b.projected_corners(&k));
        assert!(cost < 1e-3, "cost at truth {cost}");
    }

    #[test]
    fn unrolled_points_match_matrix_pipeline() {
        let b = truth();
        let x = truth_params(&b);
        let corners = build_corners(&b.dimensions, &b.location, &yaw_rotation(b.yaw));
        for i in 0..NUM_BOX_POINTS {
            let (xc, yc, zc) = camera_point(&x, &half_sign(i));
            let col = corners.column(i);
            assert!((xc - col.x).abs() < 1e-12);
            assert!((yc - col.y).abs() < 1e-12);
            assert!((zc - col.z).abs() < 1e-12);
        }

        let uv = project(
            &kitti_k().k_matrix(),
            &Points3::from_iterator(NUM_BOX_POINTS, corners.iter().copied()),
        );
        let observed: [Vec2; NUM_BOX_POINTS] =
            std::array::from_fn(|i| Vec2::new(uv[(0, i)], uv[(1, i)]));
        assert!(residual(&x, &kitti_k(), &observed) < 1e-3);
    }

    #[test]
    fn residual_grows_away_from_truth() {
        let b = truth();
        let uv = b.projected_corners(&kitti_k());
        let mut x = truth_params(&b);
        x[PoseVector::TX] += 0.1;
        let shifted = residual(&x, &kitti_k(), &uv);
        // A 0.1 lateral shift at 8 m moves every point by ~8.75 px.
        assert!(shifted > 9.0 * 8.0 * 8.0, "cost {shifted}");
    }

    #[test]
    fn combined_matches_separate_evaluators() {
        let b = truth();
        let obj = ReprojectionObjective::new(kitti_k(), b.projected_corners(&kitti_k()));
        let x = [0.1, 0.9, 3.0, 1.4, 2.0, 0.5, 1.0, 9.0];
        let (f, g) = obj.combined(&x);
        assert_eq!(f, obj.residual(&x));
        assert_eq!(g, obj.gradient(&x));

        let xd = DVector::from_row_slice(&x);
        let (fd, gd) = GradientProblem::value_and_gradient(&obj, &xd);
        assert_eq!(fd, f);
        assert_eq!(gd.as_slice(), &g);
    }

    #[test]
    fn unit_circle_retraction_preserves_residual() {
        let b = truth();
        let uv = b.projected_corners(&kitti_k());
        let pose = PoseVector::from_params(&[0.4, 1.1, 3.3, 1.6, 1.5, 0.2, 1.0, 7.5]);
        let unit = pose.on_unit_circle().unwrap();

        assert!((unit.sin_yaw.hypot(unit.cos_yaw) - 1.0).abs() < 1e-12);
        assert!((unit.yaw() - pose.yaw()).abs() < 1e-12);
        let before = residual(&pose.to_params(), &kitti_k(), &uv);
        let after = residual(&unit.to_params(), &kitti_k(), &uv);
        assert!((before - after).abs() <= 1e-9 * before.max(1.0));

        let degenerate = PoseVector::from_params(&[0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 5.0]);
        assert!(degenerate.on_unit_circle().is_none());
    }

    #[test]
    fn pose_vector_roundtrips_through_dvector() {
        let pose = PoseVector::from_prior(
            &BoxDimensions::from_hwl([1.5, 1.8, 4.0]),
            &Vec3::new(0.0, 1.0, 10.0),
        );
        assert_eq!(pose.to_params(), [0.0, 1.0, 4.0, 1.5, 1.8, 0.0, 1.0, 10.0]);
        assert_eq!(PoseVector::from_dvector(&pose.to_dvector()), pose);
        assert_eq!(pose.yaw(), 0.0);
    }
}
