//! Damped normal-equation solver for Levenberg–Marquardt steps.
//!
//! Each least-squares iteration solves a small system of the form:
//!
//! ```text
//! (JᵀJ + λ·D) δ = -Jᵀr
//! ```
//!
//! where `D` is the diagonal of `JᵀJ` (floored so flat directions still get
//! damped). The parameter dimension is tiny (5 columns), so we try Cholesky
//! first and fall back to SVD when the damped matrix is not numerically
//! positive definite.

use nalgebra::{DMatrix, DVector};

/// Smallest diagonal scale used for damping.
const DIAG_FLOOR: f64 = 1e-12;

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = -g` for the step `δ`.
///
/// `jtj` is `JᵀJ` and `g` is `Jᵀr`. Returns `None` if no finite solution exists.
pub fn solve_damped_step(jtj: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        let d = jtj[(i, i)].max(DIAG_FLOOR);
        a[(i, i)] += lambda * d;
    }
    let rhs = -g;

    if let Some(chol) = a.clone().cholesky() {
        let step = chol.solve(&rhs);
        if step.iter().all(|v| v.is_finite()) {
            return Some(step);
        }
    }

    solve_least_squares(&a, &rhs)
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn zero_damping_is_gauss_newton() {
        let jtj = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let g = DVector::from_row_slice(&[1.0, 2.0]);
        let step = solve_damped_step(&jtj, &g, 0.0).unwrap();
        let back = &jtj * &step;
        assert!((back[0] + 1.0).abs() < 1e-12);
        assert!((back[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let jtj = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let g = DVector::from_row_slice(&[1.0, 2.0]);
        let free = solve_damped_step(&jtj, &g, 0.0).unwrap();
        let damped = solve_damped_step(&jtj, &g, 100.0).unwrap();
        assert!(damped.norm() < free.norm());
    }

    #[test]
    fn singular_system_falls_back_to_svd() {
        let jtj = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let g = DVector::from_row_slice(&[1.0, 1.0]);
        let step = solve_damped_step(&jtj, &g, 0.0).unwrap();
        assert!(step.iter().all(|v| v.is_finite()));
    }
}
