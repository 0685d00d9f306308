//! Types shared by the solvers.

use crate::domain::SolverReport;

/// What a solver hands back, in unit-box coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub u: Vec<f64>,
    pub loss: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub message: String,
}

impl SolverOutcome {
    pub fn report(&self) -> SolverReport {
        SolverReport {
            iterations: self.iterations,
            evaluations: self.evaluations,
            converged: self.converged,
            message: self.message.clone(),
        }
    }
}

/// Wraps an objective and counts its evaluations.
pub struct Counted<F> {
    f: F,
    count: usize,
}

impl<F> Counted<F> {
    pub fn new(f: F) -> Self {
        Self { f, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl<F: FnMut(&[f64]) -> f64> Counted<F> {
    pub fn scalar(&mut self, u: &[f64]) -> f64 {
        self.count += 1;
        (self.f)(u)
    }
}

impl<F: FnMut(&[f64]) -> Vec<f64>> Counted<F> {
    pub fn vector(&mut self, u: &[f64]) -> Vec<f64> {
        self.count += 1;
        (self.f)(u)
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn inf_norm(a: &[f64]) -> f64 {
    a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}
