//! Bounded Levenberg–Marquardt on the residual vector ("least squares").
//!
//! Each iteration linearizes the residuals with a forward-difference Jacobian,
//! solves the damped normal equations and projects the step onto the box.
//! The damping factor shrinks after a successful step and grows after a
//! failed one.

use nalgebra::DVector;

use crate::fit::bounds::project_unit;
use crate::fit::solve::{Counted, SolverOutcome, inf_norm};
use crate::math::{JACOBIAN_STEP, jacobian_in_box, solve_damped_step};

const INITIAL_LAMBDA: f64 = 1e-3;
const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e16;

#[derive(Debug, Clone, Copy)]
pub struct LeastSquaresOptions {
    /// Relative reduction of the sum of squares.
    pub ftol: f64,
    /// Relative step size.
    pub xtol: f64,
    /// Projected gradient, relative to `1 + SSE`.
    pub gtol: f64,
    /// Residual-vector evaluations.
    pub max_evaluations: usize,
}

impl LeastSquaresOptions {
    /// Default tolerances with an evaluation cap of `100 · n_params · (n_samples + 1)`.
    pub fn for_problem(n_params: usize, n_samples: usize) -> Self {
        Self {
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            max_evaluations: 100 * n_params * (n_samples + 1),
        }
    }
}

fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

pub fn least_squares<F>(f: F, u0: &[f64], opts: &LeastSquaresOptions) -> SolverOutcome
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let n = u0.len();
    let mut res = Counted::new(f);
    let mut u = u0.to_vec();
    project_unit(&mut u);
    let mut r = res.vector(&u);
    let mut cost = sum_of_squares(&r);

    if !cost.is_finite() {
        return SolverOutcome {
            u,
            loss: cost,
            iterations: 0,
            evaluations: res.count(),
            converged: false,
            message: "residuals are not finite at the starting point".to_string(),
        };
    }

    let mut lambda = INITIAL_LAMBDA;
    let mut iterations = 0;

    let (converged, message) = 'outer: loop {
        if res.count() + n >= opts.max_evaluations {
            break (false, "evaluation limit reached".to_string());
        }

        let jac = jacobian_in_box(&mut |x: &[f64]| res.vector(x), &u, &r, JACOBIAN_STEP);
        if jac.iter().any(|v| !v.is_finite()) {
            break (false, "Jacobian is not finite".to_string());
        }

        let rv = DVector::from_column_slice(&r);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let g = &jt * &rv;

        let pg = (0..n).fold(0.0_f64, |acc, i| {
            let held = (u[i] <= 0.0 && g[i] > 0.0) || (u[i] >= 1.0 && g[i] < 0.0);
            if held { acc } else { acc.max(g[i].abs()) }
        });
        if pg <= opts.gtol * (1.0 + cost) {
            break (true, "projected gradient below tolerance".to_string());
        }

        iterations += 1;

        loop {
            if res.count() >= opts.max_evaluations {
                break 'outer (false, "evaluation limit reached".to_string());
            }

            if let Some(step) = solve_damped_step(&jtj, &g, lambda) {
                let mut trial: Vec<f64> = u.iter().zip(step.iter()).map(|(ui, si)| ui + si).collect();
                project_unit(&mut trial);
                let r_new = res.vector(&trial);
                let cost_new = sum_of_squares(&r_new);

                if cost_new.is_finite() && cost_new < cost {
                    let dx = trial.iter().zip(u.iter()).fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
                    let u_norm = inf_norm(&u);
                    let reduction = cost - cost_new;
                    let previous = cost;

                    u = trial;
                    r = r_new;
                    cost = cost_new;
                    lambda = (lambda / 10.0).max(MIN_LAMBDA);

                    if reduction <= opts.ftol * previous {
                        break 'outer (true, "relative reduction of the sum of squares below tolerance".to_string());
                    }
                    if dx <= opts.xtol * (opts.xtol + u_norm) {
                        break 'outer (true, "step size below tolerance".to_string());
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                break 'outer (true, "no damped step reduces the sum of squares".to_string());
            }
        }
    };

    tracing::debug!(iterations, evaluations = res.count(), sse = cost, converged, "Levenberg-Marquardt finished");

    SolverOutcome {
        u,
        loss: cost,
        iterations,
        evaluations: res.count(),
        converged,
        message,
    }
}
