//! Declarative constraints on the pose vector.
//!
//! Each constraint is a scalar predicate `g(x)` paired with its comparison:
//! equalities require `g(x) = 0`, inequalities require `g(x) >= 0`. No
//! constraint gradients are provided. Single-variable inequalities also
//! collapse into per-parameter [`Bounds`] for the bounded minimizer.

use boxfit_core::Real;

use crate::objective::{PoseParams, PoseVector, NUM_POSE_PARAMS};
use crate::traits::Bounds;

/// Lower bound on each box dimension.
pub const DIMENSION_MIN: Real = 1.0e-10;
/// Upper bound on each box dimension; `DIMENSION_MAX / 2` caps `ty`.
pub const DIMENSION_MAX: Real = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `g(x) = 0`
    Equality,
    /// `g(x) >= 0`
    Inequality,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    /// `s² + c² - 1`
    UnitCircle,
    /// `x[index] - value`
    AtLeast { index: usize, value: Real },
    /// `value - x[index]`
    AtMost { index: usize, value: Real },
}

impl Predicate {
    pub fn eval(&self, x: &PoseParams) -> Real {
        match *self {
            Predicate::UnitCircle => {
                x[PoseVector::SIN] * x[PoseVector::SIN] + x[PoseVector::COS] * x[PoseVector::COS]
                    - 1.0
            }
            Predicate::AtLeast { index, value } => x[index] - value,
            Predicate::AtMost { index, value } => value - x[index],
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Predicate::UnitCircle => ConstraintKind::Equality,
            Predicate::AtLeast { .. } | Predicate::AtMost { .. } => ConstraintKind::Inequality,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: &'static str,
    pub predicate: Predicate,
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        self.predicate.kind()
    }

    pub fn eval(&self, x: &PoseParams) -> Real {
        self.predicate.eval(x)
    }

    /// True if the predicate holds within `tol`.
    pub fn is_satisfied(&self, x: &PoseParams, tol: Real) -> bool {
        let g = self.eval(x);
        match self.kind() {
            ConstraintKind::Equality => g.abs() <= tol,
            ConstraintKind::Inequality => g >= -tol,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    pub constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// Names of constraints violated by `x` beyond `tol`.
    pub fn violations(&self, x: &PoseParams, tol: Real) -> Vec<&'static str> {
        self.constraints
            .iter()
            .filter(|c| !c.is_satisfied(x, tol))
            .map(|c| c.name)
            .collect()
    }

    pub fn is_feasible(&self, x: &PoseParams, tol: Real) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(x, tol))
    }

    /// Per-parameter box implied by the single-variable inequalities.
    pub fn box_bounds(&self) -> Bounds {
        let mut bounds = Bounds::unbounded(NUM_POSE_PARAMS);
        for c in &self.constraints {
            match c.predicate {
                Predicate::AtLeast { index, value } => {
                    bounds.tighten(index, value, Real::INFINITY)
                }
                Predicate::AtMost { index, value } => {
                    bounds.tighten(index, Real::NEG_INFINITY, value)
                }
                Predicate::UnitCircle => {}
            }
        }
        bounds
    }
}

/// The 10 constraints on `[s, c, l, h, w, tx, ty, tz]`:
///
/// - `s² + c² = 1`
/// - `eps_min <= l, h, w <= eps_max`
/// - `0 <= ty <= eps_max / 2`
/// - `tz >= 0`
pub fn default_constraints(eps_min: Real, eps_max: Real) -> ConstraintSet {
    use Predicate::*;
    let l = PoseVector::LENGTH;
    let h = PoseVector::HEIGHT;
    let w = PoseVector::WIDTH;
    let ty = PoseVector::TY;
    let tz = PoseVector::TZ;

    let constraints = vec![
        Constraint {
            name: "unit_circle",
            predicate: UnitCircle,
        },
        Constraint {
            name: "length_min",
            predicate: AtLeast {
                index: l,
                value: eps_min,
            },
        },
        Constraint {
            name: "height_min",
            predicate: AtLeast {
                index: h,
                value: eps_min,
            },
        },
        Constraint {
            name: "width_min",
            predicate: AtLeast {
                index: w,
                value: eps_min,
            },
        },
        Constraint {
            name: "length_max",
            predicate: AtMost {
                index: l,
                value: eps_max,
            },
        },
        Constraint {
            name: "height_max",
            predicate: AtMost {
                index: h,
                value: eps_max,
            },
        },
        Constraint {
            name: "width_max",
            predicate: AtMost {
                index: w,
                value: eps_max,
            },
        },
        Constraint {
            name: "ty_min",
            predicate: AtLeast {
                index: ty,
                value: 0.0,
            },
        },
        Constraint {
            name: "ty_max",
            predicate: AtMost {
                index: ty,
                value: eps_max / 2.0,
            },
        },
        Constraint {
            name: "tz_min",
            predicate: AtLeast {
                index: tz,
                value: 0.0,
            },
        },
    ];

    ConstraintSet { constraints }
}

impl Default for ConstraintSet {
    fn default() -> Self {
        default_constraints(DIMENSION_MIN, DIMENSION_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_has_one_equality() {
        let set = ConstraintSet::default();
        assert_eq!(set.constraints.len(), 10);
        let eq = set
            .constraints
            .iter()
            .filter(|c| c.kind() == ConstraintKind::Equality)
            .count();
        assert_eq!(eq, 1);
    }

    #[test]
    fn feasible_pose_passes() {
        let set = ConstraintSet::default();
        let (s, c) = 0.3_f64.sin_cos();
        let x = [s, c, 4.0, 1.5, 1.8, 0.0, 1.2, 8.0];
        assert!(set.is_feasible(&x, 1e-9));
        assert!(set.violations(&x, 1e-9).is_empty());
    }

    #[test]
    fn violations_are_reported_by_name() {
        let set = ConstraintSet::default();
        let x = [0.5, 0.5, 12.0, 1.5, 0.0, 0.0, -0.1, -2.0];
        let v = set.violations(&x, 0.0);
        assert_eq!(
            v,
            vec!["unit_circle", "width_min", "length_max", "ty_min", "tz_min"]
        );
    }

    #[test]
    fn ty_ceiling_is_half_dimension_max() {
        let set = ConstraintSet::default();
        let mut x = [0.0, 1.0, 4.0, 1.5, 1.8, 0.0, 5.0, 8.0];
        assert!(set.is_feasible(&x, 0.0));
        x[PoseVector::TY] = 5.01;
        assert_eq!(set.violations(&x, 0.0), vec!["ty_max"]);
    }

    #[test]
    fn box_bounds_collect_single_variable_inequalities() {
        let b = ConstraintSet::default().box_bounds();
        assert_eq!(b.lower[PoseVector::SIN], Real::NEG_INFINITY);
        assert_eq!(b.upper[PoseVector::COS], Real::INFINITY);
        assert_eq!(b.lower[PoseVector::LENGTH], DIMENSION_MIN);
        assert_eq!(b.upper[PoseVector::WIDTH], DIMENSION_MAX);
        assert_eq!(b.lower[PoseVector::TY], 0.0);
        assert_eq!(b.upper[PoseVector::TY], 5.0);
        assert_eq!(b.lower[PoseVector::TZ], 0.0);
        assert_eq!(b.upper[PoseVector::TZ], Real::INFINITY);
        assert_eq!(b.lower[PoseVector::TX], Real::NEG_INFINITY);
    }
}
