//! Bounded truncated-Newton minimization ("minimize").
//!
//! Outer loop:
//! - finite-difference gradient, projected onto the feasible directions
//! - a few conjugate-gradient iterations on the free variables, using
//!   Hessian-vector products from gradient differences
//! - projected backtracking (Armijo) line search along the resulting direction
//!
//! Hitting the iteration or evaluation cap is not an error: the current point
//! (which is the best seen, since every accepted step decreases the loss) is
//! returned with `converged = false`.

use crate::fit::bounds::project_unit;
use crate::fit::solve::{Counted, SolverOutcome, dot, inf_norm};
use crate::math::{GRADIENT_STEP, gradient_in_box};

const ARMIJO_C: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 30;
const HV_STEP: f64 = 1e-4;
const CG_RTOL: f64 = 0.1;
const CURVATURE_EPS: f64 = 1e-14;

#[derive(Debug, Clone, Copy)]
pub struct TncOptions {
    pub max_iterations: usize,
    pub max_evaluations: usize,
    /// Projected-gradient tolerance (absolute, unit-box coordinates).
    pub pgtol: f64,
    /// Relative loss-change tolerance.
    pub ftol: f64,
    /// Step-size tolerance (unit-box coordinates).
    pub xtol: f64,
}

impl Default for TncOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            max_evaluations: 50_000,
            pgtol: 1e-8,
            ftol: 1e-12,
            xtol: 1e-12,
        }
    }
}

pub fn minimize_tnc<F>(f: F, u0: &[f64], opts: &TncOptions) -> SolverOutcome
where
    F: FnMut(&[f64]) -> f64,
{
    let n = u0.len();
    let mut obj = Counted::new(f);
    let mut u = u0.to_vec();
    project_unit(&mut u);
    let mut fu = obj.scalar(&u);

    if !fu.is_finite() {
        return SolverOutcome {
            u,
            loss: fu,
            iterations: 0,
            evaluations: obj.count(),
            converged: false,
            message: "loss is not finite at the starting point".to_string(),
        };
    }

    let mut iterations = 0;
    let (converged, message) = loop {
        if iterations >= opts.max_iterations {
            break (false, "iteration limit reached".to_string());
        }
        if obj.count() + 2 * n > opts.max_evaluations {
            break (false, "evaluation limit reached".to_string());
        }

        let g = gradient_in_box(&mut |x: &[f64]| obj.scalar(x), &u, fu, GRADIENT_STEP);
        if g.iter().any(|v| !v.is_finite()) {
            break (false, "gradient is not finite".to_string());
        }

        // A variable is held when it sits on a face and the gradient pushes it outwards.
        let free: Vec<bool> = (0..n)
            .map(|i| !((u[i] <= 0.0 && g[i] > 0.0) || (u[i] >= 1.0 && g[i] < 0.0)))
            .collect();
        let pg: Vec<f64> = (0..n).map(|i| if free[i] { g[i] } else { 0.0 }).collect();

        if inf_norm(&pg) <= opts.pgtol {
            break (true, "projected gradient below tolerance".to_string());
        }

        let mut d = truncated_newton_direction(&mut obj, &u, &g, &pg, &free, opts.max_evaluations);
        if d.iter().any(|v| !v.is_finite()) || dot(&d, &pg) >= 0.0 {
            d = pg.iter().map(|v| -v).collect();
        }
        let dn = inf_norm(&d);
        if dn > 1.0 {
            for v in d.iter_mut() {
                *v /= dn;
            }
        }

        let mut accepted = None;
        let mut t = 1.0;
        for _ in 0..MAX_BACKTRACKS {
            if obj.count() >= opts.max_evaluations {
                break;
            }
            let mut trial: Vec<f64> = u.iter().zip(d.iter()).map(|(ui, di)| ui + t * di).collect();
            project_unit(&mut trial);
            let ft = obj.scalar(&trial);
            let moved: Vec<f64> = trial.iter().zip(u.iter()).map(|(a, b)| a - b).collect();
            let slope = dot(&g, &moved).min(0.0);
            if ft.is_finite() && ft < fu && ft <= fu + ARMIJO_C * slope {
                accepted = Some((trial, ft, inf_norm(&moved)));
                break;
            }
            t *= 0.5;
        }

        iterations += 1;

        let Some((trial, ft, step)) = accepted else {
            break (false, "line search could not reduce the loss".to_string());
        };

        let decrease = fu - ft;
        let scale = 1.0 + fu.abs();
        u = trial;
        fu = ft;

        if decrease <= opts.ftol * scale {
            break (true, "relative loss reduction below tolerance".to_string());
        }
        if step <= opts.xtol {
            break (true, "step size below tolerance".to_string());
        }
    };

    tracing::debug!(iterations, evaluations = obj.count(), loss = fu, converged, "truncated Newton finished");

    SolverOutcome {
        u,
        loss: fu,
        iterations,
        evaluations: obj.count(),
        converged,
        message,
    }
}

/// Approximately solve `H d = -pg` on the free variables with CG.
///
/// Stops at negative curvature (falling back to steepest descent when that
/// happens on the first iteration) or once the residual shrank enough.
fn truncated_newton_direction<F>(
    obj: &mut Counted<F>,
    u: &[f64],
    g: &[f64],
    pg: &[f64],
    free: &[bool],
    max_evaluations: usize,
) -> Vec<f64>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = u.len();
    let mut d = vec![0.0; n];
    let mut r: Vec<f64> = pg.iter().map(|v| -v).collect();
    let mut p = r.clone();
    let mut rr = dot(&r, &r);
    let r0_norm = rr.sqrt();

    for k in 0..n {
        if obj.count() + 2 * n + 1 > max_evaluations {
            break;
        }
        let Some(hp) = hessian_vector(obj, u, g, &p, free) else {
            break;
        };

        let curvature = dot(&p, &hp);
        if !(curvature > CURVATURE_EPS * dot(&p, &p)) {
            if k == 0 {
                d = r.clone();
            }
            break;
        }

        let step = rr / curvature;
        for i in 0..n {
            d[i] += step * p[i];
            r[i] -= step * hp[i];
        }

        let rr_new = dot(&r, &r);
        if rr_new.sqrt() <= CG_RTOL * r0_norm {
            break;
        }
        let beta = rr_new / rr;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
        rr = rr_new;
    }

    d
}

/// `H p ≈ (∇f(u + h p) - ∇f(u)) / h`, restricted to free variables.
fn hessian_vector<F>(obj: &mut Counted<F>, u: &[f64], g: &[f64], p: &[f64], free: &[bool]) -> Option<Vec<f64>>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = u.len();
    let pn = inf_norm(p);
    if pn == 0.0 {
        return Some(vec![0.0; n]);
    }

    let shifted = |h: f64| -> Vec<f64> { u.iter().zip(p.iter()).map(|(ui, pi)| ui + h * pi).collect() };
    let mut h = HV_STEP / pn;
    let mut probe = shifted(h);
    if probe.iter().any(|v| *v < 0.0 || *v > 1.0) {
        h = -h;
        probe = shifted(h);
    }
    project_unit(&mut probe);

    let fp = obj.scalar(&probe);
    if !fp.is_finite() {
        return None;
    }
    let gp = gradient_in_box(&mut |x: &[f64]| obj.scalar(x), &probe, fp, GRADIENT_STEP);

    Some(
        (0..n)
            .map(|i| if free[i] { (gp[i] - g[i]) / h } else { 0.0 })
            .collect(),
    )
}
