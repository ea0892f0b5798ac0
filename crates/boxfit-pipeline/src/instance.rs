use std::{fs, path::Path};

use anyhow::{Context, Result};
use boxfit_core::{BoxDimensions, CameraMatrix, Real, Vec2, Vec3, NUM_BOX_POINTS};
use boxfit_optim::Termination;
use serde::{Deserialize, Serialize};

use crate::DecodeError;

/// Per-class dimension priors, indexed by class id, each stored as `[h, w, l]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionPriors {
    pub hwl: Vec<[Real; 3]>,
}

impl DimensionPriors {
    pub fn new(hwl: Vec<[Real; 3]>) -> Self {
        Self { hwl }
    }

    pub fn get(&self, class: usize) -> Option<BoxDimensions> {
        self.hwl.get(class).map(|d| BoxDimensions::from_hwl(*d))
    }

    pub fn num_classes(&self) -> usize {
        self.hwl.len()
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        for (class, hwl) in self.hwl.iter().enumerate() {
            if !BoxDimensions::from_hwl(*hwl).is_valid() {
                return Err(DecodeError::InvalidPrior { class, hwl: *hwl });
            }
        }
        Ok(())
    }
}

/// One detected object: its class and the 9 observed box points in template order.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class: usize,
    pub correspondences: [Vec2; NUM_BOX_POINTS],
}

impl Instance {
    /// Build an instance from `[u, v]` rows, checking count and finiteness.
    ///
    /// `index` is the instance position in the batch, used for error reporting.
    pub fn from_uv_rows(index: usize, class: usize, rows: &[[Real; 2]]) -> Result<Self, DecodeError> {
        if rows.len() != NUM_BOX_POINTS {
            return Err(DecodeError::WrongCorrespondenceCount {
                instance: index,
                got: rows.len(),
            });
        }
        if let Some(point) = rows.iter().position(|uv| !(uv[0].is_finite() && uv[1].is_finite())) {
            return Err(DecodeError::NonFiniteCorrespondence {
                instance: index,
                point,
            });
        }
        Ok(Self {
            class,
            correspondences: std::array::from_fn(|i| Vec2::new(rows[i][0], rows[i][1])),
        })
    }
}

/// Outcome of fitting a single instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub accepted: bool,
    pub class: usize,
    /// `atan2(s, c)` of the solved pose.
    pub yaw: Real,
    /// Storage triple `[h, w, l]`.
    pub dimension: [Real; 3],
    pub location: [Real; 3],
    /// Calibration the instance was solved with; `camera.k` is echoed verbatim.
    pub camera: CameraMatrix,
    pub final_cost: Real,
    pub iterations: usize,
    pub termination: Termination,
}

impl FitResult {
    pub fn dimensions(&self) -> BoxDimensions {
        BoxDimensions::from_hwl(self.dimension)
    }

    pub fn location_vec(&self) -> Vec3 {
        Vec3::from(self.location)
    }
}

/// Serialized decoder input for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeInput {
    /// Class id per instance.
    pub classes: Vec<usize>,
    /// `N × 9 × [u, v]`, template order.
    pub correspondences: Vec<Vec<[Real; 2]>>,
    /// Row-major 3×3 intrinsics.
    pub k: Vec<Real>,
    pub dimension_priors: DimensionPriors,
    /// Shared initial location `[x, y, z]`.
    pub location_prior: [Real; 3],
    /// Overrides the configured image size tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<[u32; 2]>,
}

impl DecodeInput {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read input {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse input {}", path.display()))
    }

    /// Validate array shapes and build the instances.
    pub fn instances(&self) -> Result<Vec<Instance>, DecodeError> {
        if self.classes.len() != self.correspondences.len() {
            return Err(DecodeError::LengthMismatch {
                classes: self.classes.len(),
                correspondences: self.correspondences.len(),
            });
        }
        self.classes
            .iter()
            .zip(&self.correspondences)
            .enumerate()
            .map(|(i, (class, rows))| Instance::from_uv_rows(i, *class, rows))
            .collect()
    }
}
