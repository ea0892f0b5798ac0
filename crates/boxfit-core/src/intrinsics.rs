use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Mat3, Real};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntrinsicsError {
    #[error("intrinsics must have 9 entries, got {0}")]
    WrongLength(usize),
    #[error("intrinsics entry ({row}, {col}) is not finite")]
    NonFinite { row: usize, col: usize },
    #[error("K[2, 2] is zero, cannot normalise")]
    ZeroScale,
    #[error("degenerate focal length fx={fx}, fy={fy}")]
    DegenerateFocal { fx: Real, fy: Real },
}

/// Pinhole camera intrinsics.
///
/// Only the focal lengths and the principal point of
///
/// ```text
/// [ fx   .  cx ]
/// [  .  fy  cy ]
/// [  .   .   1 ]
/// ```
///
/// take part in projection; skew is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
}

impl CameraIntrinsics {
    /// Construct intrinsics from a 3×3 calibration matrix.
    ///
    /// The matrix is normalised so that `K[2, 2] == 1` before the entries are read.
    pub fn from_k_matrix(k: &Mat3) -> Result<Self, IntrinsicsError> {
        for row in 0..3 {
            for col in 0..3 {
                if !k[(row, col)].is_finite() {
                    return Err(IntrinsicsError::NonFinite { row, col });
                }
            }
        }

        let k33 = k[(2, 2)];
        if k33.abs() < 1e-12 {
            return Err(IntrinsicsError::ZeroScale);
        }
        let k_norm = *k / k33;

        let fx = k_norm[(0, 0)];
        let fy = k_norm[(1, 1)];
        if fx.abs() < 1e-12 || fy.abs() < 1e-12 {
            return Err(IntrinsicsError::DegenerateFocal { fx, fy });
        }

        Ok(Self {
            fx,
            fy,
            cx: k_norm[(0, 2)],
            cy: k_norm[(1, 2)],
        })
    }

    /// Construct intrinsics from a flattened row-major `K`.
    pub fn from_row_major(values: &[Real]) -> Result<Self, IntrinsicsError> {
        if values.len() != 9 {
            return Err(IntrinsicsError::WrongLength(values.len()));
        }
        Self::from_k_matrix(&Mat3::from_row_slice(values))
    }

    /// Build the 3×3 calibration matrix `K` (zero skew).
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Row-major flattening of [`Self::k_matrix`].
    pub fn to_row_major(&self) -> [Real; 9] {
        [
            self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        ]
    }
}

/// A calibration matrix exactly as supplied, with the pinhole model read from it.
///
/// Projection only uses [`Self::intrinsics`]; [`Self::k`] keeps skew and an
/// unnormalised `K[2, 2]` so results can echo the caller's matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    /// Row-major `K`, untouched.
    pub k: [Real; 9],
    pub intrinsics: CameraIntrinsics,
}

impl CameraMatrix {
    pub fn from_row_major(values: &[Real]) -> Result<Self, IntrinsicsError> {
        let k: [Real; 9] = values
            .try_into()
            .map_err(|_| IntrinsicsError::WrongLength(values.len()))?;
        Ok(Self {
            k,
            intrinsics: CameraIntrinsics::from_row_major(&k)?,
        })
    }
}

impl From<CameraIntrinsics> for CameraMatrix {
    fn from(intrinsics: CameraIntrinsics) -> Self {
        Self {
            k: intrinsics.to_row_major(),
            intrinsics,
        }
    }
}
