use boxfit_core::Real;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Smooth scalar objective with an analytic gradient.
pub trait GradientProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;

    /// Objective value at `x`.
    fn value(&self, x: &DVector<Real>) -> Real;

    /// Gradient of [`Self::value`] at `x`.
    fn gradient(&self, x: &DVector<Real>) -> DVector<Real>;

    /// Value and gradient in one evaluation.
    ///
    /// Implementations sharing work between the two should override this.
    fn value_and_gradient(&self, x: &DVector<Real>) -> (Real, DVector<Real>) {
        (self.value(x), self.gradient(x))
    }
}

/// Per-parameter box bounds. Infinite entries leave a side unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: DVector<Real>,
    pub upper: DVector<Real>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: DVector::from_element(n, Real::NEG_INFINITY),
            upper: DVector::from_element(n, Real::INFINITY),
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Tighten the bounds of parameter `i`.
    pub fn tighten(&mut self, i: usize, lower: Real, upper: Real) {
        self.lower[i] = self.lower[i].max(lower);
        self.upper[i] = self.upper[i].min(upper);
    }

    /// Clamp `x` into the box in place.
    pub fn project(&self, x: &mut DVector<Real>) {
        for i in 0..x.len() {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn contains(&self, x: &DVector<Real>) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

/// Largest correction history a solver will allocate.
pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Maximum number of quasi-Newton iterations.
    pub max_iters: usize,
    /// Maximum number of objective evaluations.
    pub max_evals: usize,
    /// Relative reduction tolerance: stop once
    /// `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1) <= ftol`.
    pub ftol: Real,
    /// Stop once the infinity norm of the projected gradient is `<= gtol`.
    pub gtol: Real,
    /// Number of correction pairs kept by the limited-memory update, at most [`MAX_HISTORY`].
    pub history: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 15_000,
            max_evals: 15_000,
            ftol: 2.220446049250313e-9,
            gtol: 1e-5,
            history: 10,
        }
    }
}

/// Why the minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Projected gradient fell below `gtol`.
    ProjectedGradient,
    /// Relative objective reduction fell below `ftol`.
    RelativeReduction,
    MaxIterations,
    MaxEvaluations,
    /// The line search found no step that lowers the objective.
    LineSearchFailed,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Termination::ProjectedGradient | Termination::RelativeReduction
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    pub evaluations: usize,
    pub final_cost: Real,
    pub termination: Termination,
    pub converged: bool,
}

/// Minimizer honouring per-parameter box bounds.
pub trait BoundedSolverBackend {
    fn minimize<P: GradientProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        bounds: &Bounds,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
