use nalgebra::{Matrix2xX, Matrix3, Matrix3xX, Point2, Point3, SMatrix, Vector2, Vector3};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;

/// Nine box points (8 corners + centroid) stored column-wise.
pub type Mat3x9 = SMatrix<Real, 3, 9>;
/// Four ground-plane corners stored row-wise.
pub type Mat4x3 = SMatrix<Real, 4, 3>;
/// Arbitrary number of 3D points stored column-wise.
pub type Points3 = Matrix3xX<Real>;
/// Arbitrary number of pixel coordinates stored column-wise.
pub type Pixels2 = Matrix2xX<Real>;

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: Real) -> Real {
    let wrapped = angle.sin().atan2(angle.cos());
    if wrapped <= -std::f64::consts::PI {
        wrapped + 2.0 * std::f64::consts::PI
    } else {
        wrapped
    }
}

/// Smallest signed difference `a - b` between two angles.
pub fn angle_diff(a: Real, b: Real) -> Real {
    wrap_angle(a - b)
}
