use boxfit_core::{BoxDimensions, CameraMatrix, Real, Vec3};
use boxfit_optim::{
    BoundedSolverBackend, Bounds, ConstraintSet, PoseVector, ProjectedLbfgs,
    ReprojectionObjective,
};
use log::{debug, info};
use rayon::prelude::*;

use crate::config::DecoderConfig;
use crate::instance::{DecodeInput, DimensionPriors, FitResult, Instance};
use crate::output::BoxFieldList;
use crate::DecodeError;

/// Tolerance for the post-solve feasibility check on the retracted pose.
const FEASIBILITY_TOL: Real = 1e-9;

/// Acceptance rule: strictly below the threshold.
#[inline]
pub fn accepts(cost: Real, threshold: Real) -> bool {
    cost < threshold
}

/// Fits boxes to 2D corner observations, one independent solve per instance.
#[derive(Debug, Clone)]
pub struct BoxDecoder {
    config: DecoderConfig,
    constraints: ConstraintSet,
    bounds: Bounds,
}

impl BoxDecoder {
    pub fn new(config: DecoderConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        let constraints = config.constraints();
        let bounds = constraints.box_bounds();
        Ok(Self {
            config,
            constraints,
            bounds,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Solve a single instance starting from a zero-yaw pose at the priors.
    ///
    /// Never fails: a poor fit comes back with `accepted == false`.
    pub fn fit_instance(
        &self,
        instance: &Instance,
        prior: &BoxDimensions,
        location_prior: &Vec3,
        camera: &CameraMatrix,
    ) -> FitResult {
        let objective = ReprojectionObjective::new(camera.intrinsics, instance.correspondences);
        let mut x0 = PoseVector::from_prior(prior, location_prior).to_dvector();
        self.bounds.project(&mut x0);

        let (x, report) =
            ProjectedLbfgs.minimize(&objective, x0, &self.bounds, &self.config.solver);

        let solved = PoseVector::from_dvector(&x);
        let mut accepted = accepts(report.final_cost, self.config.acceptance_threshold);
        let pose = match solved.on_unit_circle() {
            Some(pose) => pose,
            None => {
                debug!(
                    "class {}: degenerate yaw parameters ({}, {})",
                    instance.class, solved.sin_yaw, solved.cos_yaw
                );
                accepted = false;
                solved
            }
        };

        if !accepted {
            debug!(
                "class {}: rejected, cost {:.4e} after {} iterations ({:?})",
                instance.class, report.final_cost, report.iterations, report.termination
            );
        } else {
            let violated = self
                .constraints
                .violations(&pose.to_params(), FEASIBILITY_TOL);
            if !violated.is_empty() {
                debug!(
                    "class {}: rejected, retracted pose violates {:?}",
                    instance.class, violated
                );
                accepted = false;
            }
        }

        FitResult {
            accepted,
            class: instance.class,
            yaw: pose.yaw(),
            dimension: pose.dimensions().to_hwl(),
            location: pose.location.into(),
            camera: *camera,
            final_cost: report.final_cost,
            iterations: report.iterations,
            termination: report.termination,
        }
    }

    /// Fit every instance and return one result per input, in input order.
    ///
    /// All inputs are validated before the first solve.
    pub fn fit_all(
        &self,
        instances: &[Instance],
        camera: &CameraMatrix,
        priors: &DimensionPriors,
        location_prior: &Vec3,
    ) -> Result<Vec<FitResult>, DecodeError> {
        priors.validate()?;
        if !location_prior.iter().all(|v| v.is_finite()) {
            return Err(DecodeError::InvalidLocationPrior((*location_prior).into()));
        }
        let jobs = instances
            .iter()
            .enumerate()
            .map(|(i, inst)| {
                priors
                    .get(inst.class)
                    .map(|prior| (inst, prior))
                    .ok_or(DecodeError::UnknownClass {
                        instance: i,
                        class: inst.class,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fit = |(inst, prior): &(&Instance, BoxDimensions)| {
            self.fit_instance(inst, prior, location_prior, camera)
        };
        let results: Vec<FitResult> = if self.config.parallel {
            jobs.par_iter().map(fit).collect()
        } else {
            jobs.iter().map(fit).collect()
        };
        Ok(results)
    }

    /// Fit every instance and keep the accepted ones.
    pub fn decode(
        &self,
        instances: &[Instance],
        camera: &CameraMatrix,
        priors: &DimensionPriors,
        location_prior: &Vec3,
    ) -> Result<BoxFieldList, DecodeError> {
        let results = self.fit_all(instances, camera, priors, location_prior)?;

        let mut out = BoxFieldList::new(self.config.image_size);
        for r in &results {
            out.push(r);
        }
        info!("decoded {}/{} boxes", out.len(), results.len());
        Ok(out)
    }
}

/// Decode one frame from raw arrays.
///
/// `k` is the row-major 3×3 intrinsics; `correspondences` holds 9 `[u, v]`
/// rows per instance in template order.
pub fn decode_boxes(
    classes: &[usize],
    correspondences: &[Vec<[Real; 2]>],
    k: &[Real],
    priors: &DimensionPriors,
    location_prior: [Real; 3],
    config: &DecoderConfig,
) -> Result<BoxFieldList, DecodeError> {
    let input = DecodeInput {
        classes: classes.to_vec(),
        correspondences: correspondences.to_vec(),
        k: k.to_vec(),
        dimension_priors: priors.clone(),
        location_prior,
        image_size: None,
    };
    decode_input(&input, config)
}

/// Decode a deserialized frame. The input's image size, when present,
/// overrides the configured one.
pub fn decode_input(input: &DecodeInput, config: &DecoderConfig) -> Result<BoxFieldList, DecodeError> {
    let mut config = config.clone();
    if let Some(size) = input.image_size {
        config.image_size = size;
    }
    let decoder = BoxDecoder::new(config)?;
    let instances = input.instances()?;
    let camera = CameraMatrix::from_row_major(&input.k)?;
    decoder.decode(
        &instances,
        &camera,
        &input.dimension_priors,
        &Vec3::from(input.location_prior),
    )
}
