//! Unit-box scaling of the parameter space.
//!
//! Solvers see `u = (x - lo) / (hi - lo) ∈ [0, 1]^5`. A fixed parameter
//! (`lo == hi`) maps to `u = 0` and always decodes back to `lo`.

use crate::domain::{ModelParameters, ParamBounds};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxScaling {
    lower: [f64; 5],
    upper: [f64; 5],
}

impl BoxScaling {
    pub fn new(bounds: &ParamBounds) -> Self {
        let (lower, upper) = bounds.lower_upper();
        Self { lower, upper }
    }

    pub fn to_unit(&self, params: &ModelParameters) -> Vec<f64> {
        params
            .to_array()
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let span = self.upper[i] - self.lower[i];
                if span > 0.0 {
                    ((x - self.lower[i]) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn from_unit(&self, u: &[f64]) -> ModelParameters {
        let mut x = [0.0; 5];
        for (i, xi) in x.iter_mut().enumerate() {
            let span = self.upper[i] - self.lower[i];
            let ui = u.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
            *xi = if span > 0.0 {
                // Keep the upper face exact.
                if ui >= 1.0 { self.upper[i] } else { self.lower[i] + ui * span }
            } else {
                self.lower[i]
            };
        }
        ModelParameters::from_array(x)
    }
}

/// Clamp every coordinate into `[0, 1]`.
pub fn project_unit(u: &mut [f64]) {
    for v in u.iter_mut() {
        *v = v.clamp(0.0, 1.0);
    }
}
