//! Bounded limited-memory BFGS driven by `argmin`.
//!
//! `argmin`'s L-BFGS with a More-Thuente line search is unconstrained, so the
//! box is enforced by an outer active-set loop around the executor:
//! 1. variables within `eps` of a bound whose gradient points outward are
//!    snapped onto that bound and held fixed for the round,
//! 2. the free variables are minimized over `f(P(x))/ρ + ½|x - P(x)|²` with
//!    `ρ = max(‖g‖∞, 1)` at the anchor, which is a rescaled `f` inside the box
//!    and pulls stray iterates back onto it; the rescaling keeps the first
//!    unit-length L-BFGS step within about one unit per coordinate,
//! 3. the best projected point evaluated anchors the next round.
//!
//! Only strict improvements replace the incumbent, so the returned cost never
//! exceeds the cost at the projected start.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use argmin::core::observers::{Observe, ObserverMode};
use argmin::core::{CostFunction, Error, Executor, Gradient, State, KV};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use boxfit_core::Real;
use log::trace;
use nalgebra::DVector;

use crate::traits::{
    Bounds, BoundedSolverBackend, GradientProblem, SolveOptions, SolveReport, Termination,
    MAX_HISTORY,
};

/// Widest band next to a bound inside which an outward-pushed variable is pinned.
const ACTIVE_SET_EPS: Real = 1.0e-3;

#[derive(Debug, Default, Clone)]
pub struct ProjectedLbfgs;

/// Best feasible point evaluated so far.
#[derive(Clone)]
struct Incumbent {
    x: DVector<Real>,
    f: Real,
    g: DVector<Real>,
}

impl Incumbent {
    fn offer(&mut self, x: &DVector<Real>, f: Real, g: &DVector<Real>) -> bool {
        if !f.is_finite() || (self.f.is_finite() && f >= self.f) {
            return false;
        }
        self.x.copy_from(x);
        self.f = f;
        self.g.copy_from(g);
        true
    }
}

struct Evaluation {
    z: Vec<Real>,
    value: Real,
    gradient: Vec<Real>,
}

/// One round's view of the problem: the free variables of `anchor`, with the
/// pinned ones held on their bounds.
struct FreeSubproblem<'a, P> {
    problem: &'a P,
    bounds: &'a Bounds,
    anchor: DVector<Real>,
    free: Vec<usize>,
    /// `1 / ρ`.
    scale: Real,
    max_evals: usize,
    evaluations: &'a Cell<usize>,
    best: &'a RefCell<Incumbent>,
    last: RefCell<Option<Evaluation>>,
}

impl<P: GradientProblem> FreeSubproblem<'_, P> {
    /// Value and reduced gradient at `z`. Cost and gradient requests at the
    /// same point share one objective evaluation.
    fn evaluate(&self, z: &[Real]) -> Result<(Real, Vec<Real>), Error> {
        if let Some(hit) = self.last.borrow().as_ref().filter(|e| e.z.as_slice() == z) {
            return Ok((hit.value, hit.gradient.clone()));
        }
        if self.evaluations.get() >= self.max_evals {
            return Err(Error::msg("evaluation budget exhausted"));
        }

        let mut x = self.anchor.clone();
        for (&i, &zi) in self.free.iter().zip(z) {
            x[i] = zi;
        }
        let mut xp = x.clone();
        self.bounds.project(&mut xp);
        let (f, g) = self.problem.value_and_gradient(&xp);
        self.evaluations.set(self.evaluations.get() + 1);
        if !f.is_finite() {
            return Err(Error::msg("objective is not finite"));
        }
        self.best.borrow_mut().offer(&xp, f, &g);

        let mut value = f * self.scale;
        let mut gradient = Vec::with_capacity(self.free.len());
        for &i in &self.free {
            let outside = x[i] - xp[i];
            if outside == 0.0 {
                gradient.push(g[i] * self.scale);
            } else {
                value += 0.5 * outside * outside;
                gradient.push(outside);
            }
        }

        *self.last.borrow_mut() = Some(Evaluation {
            z: z.to_vec(),
            value,
            gradient: gradient.clone(),
        });
        Ok((value, gradient))
    }
}

impl<P: GradientProblem> CostFunction for FreeSubproblem<'_, P> {
    type Param = Vec<Real>;
    type Output = Real;

    fn cost(&self, z: &Self::Param) -> Result<Self::Output, Error> {
        self.evaluate(z).map(|(value, _)| value)
    }
}

impl<P: GradientProblem> Gradient for FreeSubproblem<'_, P> {
    type Param = Vec<Real>;
    type Gradient = Vec<Real>;

    fn gradient(&self, z: &Self::Param) -> Result<Self::Gradient, Error> {
        self.evaluate(z).map(|(_, gradient)| gradient)
    }
}

/// Counts quasi-Newton iterations across rounds.
struct IterationCounter(Arc<AtomicUsize>);

impl<I: State> Observe<I> for IterationCounter {
    fn observe_iter(&mut self, _state: &I, _kv: &KV) -> Result<(), Error> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// `‖x - P(x - g)‖∞`, zero exactly at a first-order point of the box problem.
fn projected_gradient_norm(x: &DVector<Real>, g: &DVector<Real>, bounds: &Bounds) -> Real {
    let mut step = x - g;
    bounds.project(&mut step);
    (x - step).amax()
}

/// Whether variable `i` lies within `eps` of a bound its gradient pushes against.
fn pushed_against_bound(
    x: &DVector<Real>,
    g: &DVector<Real>,
    bounds: &Bounds,
    i: usize,
    eps: Real,
) -> bool {
    (x[i] <= bounds.lower[i] + eps && g[i] > 0.0)
        || (x[i] >= bounds.upper[i] - eps && g[i] < 0.0)
}

/// Move every variable pushed against a nearby bound onto that bound.
fn snap_to_active_bounds(current: &Incumbent, bounds: &Bounds, eps: Real) -> DVector<Real> {
    let mut x = current.x.clone();
    for i in 0..x.len() {
        if pushed_against_bound(&current.x, &current.g, bounds, i, eps) {
            x[i] = if current.g[i] > 0.0 {
                bounds.lower[i]
            } else {
                bounds.upper[i]
            };
        }
    }
    x
}

fn run_round<P: GradientProblem>(
    subproblem: FreeSubproblem<'_, P>,
    z0: Vec<Real>,
    max_iters: usize,
    opts: &SolveOptions,
    iterations: &Arc<AtomicUsize>,
) -> Result<(), Error> {
    // Tolerances apply to the unscaled objective.
    let scale = subproblem.scale;
    let linesearch: MoreThuenteLineSearch<Vec<Real>, Vec<Real>, Real> =
        MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, opts.history.clamp(1, MAX_HISTORY))
        .with_tolerance_grad(opts.gtol.max(0.0) * scale)?
        .with_tolerance_cost(opts.ftol.max(0.0) * scale)?;

    Executor::new(subproblem, solver)
        .configure(|state| state.param(z0).max_iters(max_iters as u64))
        .add_observer(IterationCounter(Arc::clone(iterations)), ObserverMode::Always)
        .run()?;
    Ok(())
}

impl BoundedSolverBackend for ProjectedLbfgs {
    fn minimize<P: GradientProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        bounds: &Bounds,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let mut x = x0;
        bounds.project(&mut x);
        let (f, g) = problem.value_and_gradient(&x);
        let evaluations = Cell::new(1);
        let iterations = Arc::new(AtomicUsize::new(0));
        let best = RefCell::new(Incumbent { x, f, g });

        let termination = loop {
            let current = best.borrow().clone();
            let pg = projected_gradient_norm(&current.x, &current.g, bounds);
            if pg <= opts.gtol {
                break Termination::ProjectedGradient;
            }
            let done = iterations.load(Ordering::Relaxed);
            if done >= opts.max_iters {
                break Termination::MaxIterations;
            }
            if evaluations.get() >= opts.max_evals {
                break Termination::MaxEvaluations;
            }

            let mut eps = pg.min(ACTIVE_SET_EPS);
            let snapped = snap_to_active_bounds(&current, bounds, eps);
            if snapped != current.x {
                let (f_snap, g_snap) = problem.value_and_gradient(&snapped);
                evaluations.set(evaluations.get() + 1);
                if best.borrow_mut().offer(&snapped, f_snap, &g_snap) {
                    continue;
                }
                // Snapping hurt; only pin what already sits on a bound.
                eps = 0.0;
            }

            let free: Vec<usize> = (0..current.x.len())
                .filter(|&i| !pushed_against_bound(&current.x, &current.g, bounds, i, eps))
                .collect();
            if free.is_empty() {
                break Termination::ProjectedGradient;
            }

            let scale = 1.0 / current.g.amax().max(1.0);
            let z0: Vec<Real> = free.iter().map(|&i| current.x[i]).collect();
            let primed = Evaluation {
                z: z0.clone(),
                value: current.f * scale,
                gradient: free.iter().map(|&i| current.g[i] * scale).collect(),
            };
            let subproblem = FreeSubproblem {
                problem,
                bounds,
                anchor: current.x.clone(),
                scale,
                free,
                max_evals: opts.max_evals,
                evaluations: &evaluations,
                best: &best,
                last: RefCell::new(Some(primed)),
            };
            let outcome = run_round(subproblem, z0, opts.max_iters - done, opts, &iterations);

            let f_new = best.borrow().f;
            let reduction = (current.f - f_new) / current.f.abs().max(f_new.abs()).max(1.0);
            match outcome {
                Err(_) if evaluations.get() >= opts.max_evals => {
                    break Termination::MaxEvaluations;
                }
                Err(err) => {
                    trace!("bounded L-BFGS round stopped early: {err}");
                    if reduction > 0.0 {
                        continue;
                    }
                    break Termination::LineSearchFailed;
                }
                Ok(()) if reduction.is_nan() => break Termination::LineSearchFailed,
                Ok(()) if reduction <= opts.ftol => break Termination::RelativeReduction,
                Ok(()) => {}
            }
        };

        let Incumbent { x, f, .. } = best.into_inner();
        let iterations = iterations.load(Ordering::Relaxed);
        let evaluations = evaluations.get();
        trace!(
            "bounded L-BFGS stopped: {:?} after {} iterations, {} evaluations, f = {:.6e}",
            termination,
            iterations,
            evaluations,
            f
        );

        (
            x,
            SolveReport {
                iterations,
                evaluations,
                final_cost: f,
                termination,
                converged: termination.is_converged(),
            },
        )
    }
}
