//! Non-linear optimization for 3D box fitting.
//!
//! This crate holds the reprojection objective over the 8-parameter pose
//! vector, the declarative constraint set bounding that search, and a
//! bounded L-BFGS minimizer built on `argmin` that honours per-parameter box
//! bounds.

pub mod constraints;
pub mod objective;
pub mod solver;
pub mod traits;

pub use crate::constraints::{
    default_constraints, Constraint, ConstraintKind, ConstraintSet, Predicate,
};
pub use crate::objective::{PoseVector, ReprojectionObjective};
pub use crate::solver::lbfgsb::ProjectedLbfgs;
pub use crate::traits::{
    Bounds, BoundedSolverBackend, GradientProblem, SolveOptions, SolveReport, Termination,
    MAX_HISTORY,
};
