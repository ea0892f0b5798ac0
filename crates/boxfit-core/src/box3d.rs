use serde::{Deserialize, Serialize};

use crate::{
    build_corners, build_ground_corners, project_box_corners, yaw_rotation, BoxDimensions,
    CameraIntrinsics, Mat3x9, Mat4x3, Real, Vec2, Vec3, NUM_BOX_POINTS,
};

/// A box posed in the camera frame by its yaw and centroid location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box3D {
    pub dimensions: BoxDimensions,
    /// Rotation about the vertical axis, radians.
    pub yaw: Real,
    /// Centroid in camera coordinates.
    pub location: Vec3,
}

impl Box3D {
    pub fn new(dimensions: BoxDimensions, yaw: Real, location: Vec3) -> Self {
        Self {
            dimensions,
            yaw,
            location,
        }
    }

    /// The 9 box points (columns), template order.
    pub fn corners(&self) -> Mat3x9 {
        build_corners(&self.dimensions, &self.location, &yaw_rotation(self.yaw))
    }

    /// The 4 ground-plane corners (rows).
    pub fn ground_corners(&self) -> Mat4x3 {
        build_ground_corners(&self.dimensions, &self.location, &yaw_rotation(self.yaw))
    }

    /// Pixel projections of the 9 box points, template order.
    pub fn projected_corners(&self, intrinsics: &CameraIntrinsics) -> [Vec2; NUM_BOX_POINTS] {
        project_box_corners(&self.dimensions, &self.location, self.yaw, intrinsics)
    }

    /// Same box with every length (dimensions and location) multiplied by `scale`.
    ///
    /// A scaled box projects onto the same pixels, which is the depth/size
    /// ambiguity of monocular recovery.
    pub fn scaled(&self, scale: Real) -> Self {
        let d = self.dimensions;
        Self {
            dimensions: BoxDimensions::new(d.length * scale, d.height * scale, d.width * scale),
            yaw: self.yaw,
            location: self.location * scale,
        }
    }
}
