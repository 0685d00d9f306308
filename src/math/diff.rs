//! Finite-difference derivatives on the unit box `[0, 1]^n`.
//!
//! The solvers work in box-scaled coordinates, so every coordinate lives in
//! `[0, 1]` and a single absolute step size fits all parameters. Differences
//! never step outside the box: near a face we switch to the one-sided
//! difference pointing inwards.

use nalgebra::DMatrix;

/// Default step for gradients (central differences).
pub const GRADIENT_STEP: f64 = 1e-6;

/// Default step for Jacobians (forward differences).
pub const JACOBIAN_STEP: f64 = 1.5e-8;

/// Gradient of the scalar function `f` at `u`.
///
/// Uses central differences where both neighbours are inside the box and
/// one-sided differences at the faces. Costs `2n` evaluations in the interior.
pub fn gradient_in_box<F>(f: &mut F, u: &[f64], fu: f64, step: f64) -> Vec<f64>
where
    F: FnMut(&[f64]) -> f64,
{
    let mut probe = u.to_vec();
    let mut grad = vec![0.0; u.len()];

    for j in 0..u.len() {
        let uj = u[j];
        let can_up = uj + step <= 1.0;
        let can_down = uj - step >= 0.0;

        grad[j] = if can_up && can_down {
            probe[j] = uj + step;
            let f_up = f(&probe);
            probe[j] = uj - step;
            let f_down = f(&probe);
            (f_up - f_down) / (2.0 * step)
        } else if can_up {
            probe[j] = uj + step;
            (f(&probe) - fu) / step
        } else {
            probe[j] = uj - step;
            (fu - f(&probe)) / step
        };
        probe[j] = uj;
    }

    grad
}

/// Jacobian (`m × n`) of the vector function `f` at `u`, given `r0 = f(u)`.
///
/// Forward differences, flipped to backward at the upper face. Costs `n`
/// evaluations.
pub fn jacobian_in_box<F>(f: &mut F, u: &[f64], r0: &[f64], step: f64) -> DMatrix<f64>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let m = r0.len();
    let n = u.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut probe = u.to_vec();

    for j in 0..n {
        let h = if u[j] + step <= 1.0 { step } else { -step };
        probe[j] = u[j] + h;
        let r = f(&probe);
        for i in 0..m {
            jac[(i, j)] = (r[i] - r0[i]) / h;
        }
        probe[j] = u[j];
    }

    jac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_of_quadratic() {
        let mut f = |u: &[f64]| (u[0] - 0.3).powi(2) + 2.0 * (u[1] - 0.7).powi(2);
        let u = [0.5, 0.5];
        let fu = f(&u);
        let g = gradient_in_box(&mut f, &u, fu, GRADIENT_STEP);
        assert!((g[0] - 0.4).abs() < 1e-6);
        assert!((g[1] + 0.8).abs() < 1e-6);
    }

    #[test]
    fn gradient_stays_inside_box_at_faces() {
        let mut seen_outside = false;
        let mut f = |u: &[f64]| {
            if u.iter().any(|v| *v < 0.0 || *v > 1.0) {
                seen_outside = true;
            }
            u[0] * u[0] + u[1]
        };
        let u = [0.0, 1.0];
        let fu = f(&u);
        let g = gradient_in_box(&mut f, &u, fu, GRADIENT_STEP);
        assert!(!seen_outside);
        assert!(g[0].abs() < 1e-5);
        assert!((g[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn jacobian_of_linear_map() {
        let mut f = |u: &[f64]| vec![2.0 * u[0] + u[1], -u[1], 3.0 * u[0]];
        let u = [0.2, 1.0];
        let r0 = f(&u);
        let jac = jacobian_in_box(&mut f, &u, &r0, JACOBIAN_STEP);
        let expected = [[2.0, 1.0], [0.0, -1.0], [3.0, 0.0]];
        for i in 0..3 {
            for j in 0..2 {
                assert!((jac[(i, j)] - expected[i][j]).abs() < 1e-6);
            }
        }
    }
}
