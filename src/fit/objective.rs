//! Loss and residuals of the reaction-rate model against an experiment.

use crate::domain::{DerivedCurve, FitQuality, ModelParameters};
use crate::models::{predict_hrr, predict_with_conversion};

/// `model(params) - HRR`, aligned with the series.
pub fn residuals(
    params: &ModelParameters,
    temperature_k: &[f64],
    hrr: &[f64],
    delta_q: f64,
    heating_rate: f64,
) -> Vec<f64> {
    predict_hrr(params, temperature_k, hrr, delta_q, heating_rate)
        .into_iter()
        .zip(hrr.iter())
        .map(|(p, h)| p - h)
        .collect()
}

/// Sum of squared residuals.
pub fn loss(params: &ModelParameters, temperature_k: &[f64], hrr: &[f64], delta_q: f64, heating_rate: f64) -> f64 {
    sum_of_squares(&residuals(params, temperature_k, hrr, delta_q, heating_rate))
}

fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Objective bound to one experiment and its derived curve.
///
/// The conversion fraction does not depend on the parameters, so it is taken
/// from the [`DerivedCurve`] instead of being re-integrated on every solver
/// evaluation. Values are identical to [`residuals`] / [`loss`].
#[derive(Debug, Clone, Copy)]
pub struct Objective<'a> {
    hrr: &'a [f64],
    derived: &'a DerivedCurve,
}

impl<'a> Objective<'a> {
    pub fn new(hrr: &'a [f64], derived: &'a DerivedCurve) -> Self {
        Self { hrr, derived }
    }

    pub fn len(&self) -> usize {
        self.hrr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hrr.is_empty()
    }

    pub fn residuals(&self, params: &ModelParameters) -> Vec<f64> {
        predict_with_conversion(
            params,
            &self.derived.temperature_k,
            &self.derived.alpha,
            self.derived.delta_q,
        )
        .into_iter()
        .zip(self.hrr.iter())
        .map(|(p, h)| p - h)
        .collect()
    }

    /// Sum of squared residuals; `+∞` when the model overflows.
    ///
    /// Solvers compare losses, so NaN is never returned.
    pub fn loss(&self, params: &ModelParameters) -> f64 {
        let sse = sum_of_squares(&self.residuals(params));
        if sse.is_finite() { sse } else { f64::INFINITY }
    }

    /// SSE, RMSE and R² at `params`.
    pub fn quality(&self, params: &ModelParameters) -> FitQuality {
        let sse = sum_of_squares(&self.residuals(params));
        let n = self.hrr.len();
        let rmse = if n == 0 { 0.0 } else { (sse / n as f64).sqrt() };

        let mean = if n == 0 { 0.0 } else { self.hrr.iter().sum::<f64>() / n as f64 };
        let sst: f64 = self.hrr.iter().map(|h| (h - mean) * (h - mean)).sum();
        let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };

        FitQuality {
            sse,
            rmse,
            r_squared,
            n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExperimentSeries;
    use crate::fit::compute_derived;

    #[test]
    fn cached_objective_matches_free_functions() {
        let series =
            ExperimentSeries::from_columns(&[20.0, 40.0, 60.0, 80.0, 100.0], &[0.0, 1.0, 5.0, 3.0, 0.5]).unwrap();
        let beta = 0.1667;
        let derived = compute_derived(&series, beta).unwrap();
        let hrr = series.hrr();
        let objective = Objective::new(&hrr, &derived);

        let params = ModelParameters {
            a: 2e10,
            log_ea: 6e4_f64.ln(),
            n: 1.5,
            m: 0.5,
            alpha_zv: 0.05,
        };

        let free = residuals(&params, &derived.temperature_k, &hrr, derived.delta_q, beta);
        let cached = objective.residuals(&params);
        assert_eq!(free.len(), 5);
        for (a, b) in free.iter().zip(cached.iter()) {
            assert!((a - b).abs() <= 1e-12 * (1.0 + a.abs()));
        }

        let l = loss(&params, &derived.temperature_k, &hrr, derived.delta_q, beta);
        assert!((l - objective.loss(&params)).abs() <= 1e-12 * (1.0 + l));
        assert!((l - free.iter().map(|r| r * r).sum::<f64>()).abs() <= 1e-12 * (1.0 + l));
    }

    #[test]
    fn quality_of_flat_series_has_zero_r_squared() {
        let derived = DerivedCurve {
            temperature_k: vec![300.0, 310.0],
            delta_q: 1.0,
            alpha: vec![0.0, 1.0],
        };
        let hrr = [2.0, 2.0];
        let objective = Objective::new(&hrr, &derived);
        let q = objective.quality(&ModelParameters::default());
        assert_eq!(q.r_squared, 0.0);
        assert_eq!(q.n, 2);
        assert!((q.rmse - (q.sse / 2.0).sqrt()).abs() < 1e-12);
    }
}
