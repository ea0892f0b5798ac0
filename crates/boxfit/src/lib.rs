//! High-level entry crate for `boxfit`.
//!
//! Recovers the 3D pose and size of boxes from the image positions of their
//! 8 corners and centroid. Each instance is fitted independently by
//! minimizing the summed squared reprojection error over
//! `[sin(yaw), cos(yaw), l, h, w, tx, ty, tz]` under per-parameter bounds.
//!
//! ```no_run
//! use boxfit::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let classes = vec![0];
//! let correspondences: Vec<Vec<[f64; 2]>> = /* 9 [u, v] rows per instance */
//! # vec![vec![[0.0; 2]; 9]];
//! let k = [700.0, 0.0, 320.0, 0.0, 700.0, 240.0, 0.0, 0.0, 1.0];
//! let priors = DimensionPriors::new(vec![[1.5, 1.6, 3.9]]);
//!
//! let boxes = decode_boxes(
//!     &classes,
//!     &correspondences,
//!     &k,
//!     &priors,
//!     [0.0, 1.0, 10.0],
//!     &DecoderConfig::default(),
//! )?;
//! println!("accepted {} of {}", boxes.len(), classes.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`core`]**: Math types, intrinsics, corner template and projection
//! - **[`optim`]**: Reprojection objective, constraints and the bounded minimizer
//! - **[`pipeline`]**: Per-instance decoding, acceptance and output aggregation
//! - **[`prelude`]**: Convenient re-exports for common use cases

/// Core math types, intrinsics and box geometry.
pub mod core {
    pub use boxfit_core::*;
}

/// Reprojection objective, constraint set and projected L-BFGS.
pub mod optim {
    pub use boxfit_optim::*;
}

/// Decoding of whole frames into a [`pipeline::BoxFieldList`].
pub mod pipeline {
    pub use boxfit_pipeline::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use boxfit::prelude::*;` to get started quickly.
pub mod prelude {
    pub use boxfit_core::{
        Box3D, BoxDimensions, CameraIntrinsics, CameraMatrix, Real, Vec2, Vec3,
    };
    pub use boxfit_pipeline::{
        decode_boxes, decode_input, BoxDecoder, BoxFieldList, DecodeError, DecodeInput,
        DecoderConfig, DimensionPriors, FitResult,
    };
}
