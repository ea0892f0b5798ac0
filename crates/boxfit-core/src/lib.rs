//! Core math and geometry primitives for `boxfit`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Mat3`, ...),
//! - pinhole [`CameraIntrinsics`] with validated construction from `K`,
//! - yaw-only box geometry: the canonical corner template, corner generation
//!   and pinhole projection,
//! - seeded synthetic data helpers used by tests and examples.
//!
//! Box pipeline:
//! `pixel = project(K, R(yaw) · diag(l/2, h/2, w/2) · template + t)`

/// Linear algebra type aliases and helpers.
pub mod math;
/// Pinhole camera intrinsics.
pub mod intrinsics;
/// Yaw rotation, corner template, corner generation and projection.
pub mod geometry;
/// A posed 3D box bundling dimensions, yaw and location.
pub mod box3d;
/// Seeded synthetic box observations.
pub mod synthetic;

pub use box3d::*;
pub use geometry::*;
pub use intrinsics::*;
pub use math::*;
