use std::{fs, path::Path};

use anyhow::{Context, Result};
use boxfit_core::Real;
use boxfit_optim::constraints::{default_constraints, DIMENSION_MAX, DIMENSION_MIN};
use boxfit_optim::{ConstraintSet, SolveOptions, MAX_HISTORY};
use serde::{Deserialize, Serialize};

use crate::DecodeError;

/// Frame size attached to the output when the input does not carry one.
pub const DEFAULT_IMAGE_SIZE: [u32; 2] = [640, 640];

/// Decoder settings. Every field has a default, so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// A fit is accepted iff its final summed squared pixel error is strictly below this.
    pub acceptance_threshold: Real,
    /// Bounded minimizer settings.
    pub solver: SolveOptions,
    /// `[min, max]` for each box dimension; `max / 2` also caps the location's `y`.
    pub dimension_bounds: [Real; 2],
    /// `[width, height]` tag carried by the output.
    pub image_size: [u32; 2],
    /// Fit instances on the rayon thread pool. Output order is unaffected.
    pub parallel: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.1,
            solver: SolveOptions::default(),
            dimension_bounds: [DIMENSION_MIN, DIMENSION_MAX],
            image_size: DEFAULT_IMAGE_SIZE,
            parallel: false,
        }
    }
}

impl DecoderConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        let [lo, hi] = self.dimension_bounds;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo < hi) {
            return Err(DecodeError::InvalidConfig(format!(
                "dimension bounds [{lo}, {hi}] must satisfy 0 <= min < max"
            )));
        }
        if !(self.acceptance_threshold > 0.0) {
            return Err(DecodeError::InvalidConfig(format!(
                "acceptance threshold must be positive, got {}",
                self.acceptance_threshold
            )));
        }
        if self.solver.max_iters == 0 || self.solver.max_evals == 0 {
            return Err(DecodeError::InvalidConfig(
                "solver iteration and evaluation caps must be positive".to_string(),
            ));
        }
        let SolveOptions {
            ftol, gtol, history, ..
        } = self.solver;
        if !(ftol.is_finite() && ftol >= 0.0 && gtol.is_finite() && gtol >= 0.0) {
            return Err(DecodeError::InvalidConfig(format!(
                "solver tolerances must be finite and non-negative, got ftol {ftol}, gtol {gtol}"
            )));
        }
        if !(1..=MAX_HISTORY).contains(&history) {
            return Err(DecodeError::InvalidConfig(format!(
                "solver history must be in 1..={MAX_HISTORY}, got {history}"
            )));
        }
        Ok(())
    }

    pub fn constraints(&self) -> ConstraintSet {
        default_constraints(self.dimension_bounds[0], self.dimension_bounds[1])
    }
}
