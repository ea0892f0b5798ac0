//! Seeded synthetic observations for tests and examples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Box3D, CameraIntrinsics, Real, Vec2, NUM_BOX_POINTS};

/// Uniform per-corner pixel jitter in `[-max_abs_px, max_abs_px]` on each axis.
///
/// Each instance draws from its own stream keyed by `(seed, instance_idx)`, so
/// a box's observations do not depend on its position in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerJitter {
    pub seed: u64,
    /// Maximum absolute per-axis offset (pixels).
    pub max_abs_px: Real,
}

impl CornerJitter {
    fn rng(&self, instance_idx: usize) -> StdRng {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&self.seed.to_le_bytes());
        key[8..16].copy_from_slice(&(instance_idx as u64).to_le_bytes());
        StdRng::from_seed(key)
    }

    /// Offset every corner of one instance in place.
    pub fn apply(&self, corners: &mut [Vec2], instance_idx: usize) {
        let max_abs = self.max_abs_px.abs();
        if max_abs == 0.0 {
            return;
        }
        let mut rng = self.rng(instance_idx);
        for p in corners {
            p.x += rng.random_range(-max_abs..=max_abs);
            p.y += rng.random_range(-max_abs..=max_abs);
        }
    }
}

/// Project a box into pixels and jitter its corners.
pub fn observe_box(
    b: &Box3D,
    intrinsics: &CameraIntrinsics,
    jitter: &CornerJitter,
    instance_idx: usize,
) -> [Vec2; NUM_BOX_POINTS] {
    let mut uv = b.projected_corners(intrinsics);
    jitter.apply(&mut uv, instance_idx);
    uv
}

/// Convert pixel points into the `[u, v]` layout used by serialized inputs.
pub fn to_uv_rows(points: &[Vec2]) -> Vec<[Real; 2]> {
    points.iter().map(|p| [p.x, p.y]).collect()
}
