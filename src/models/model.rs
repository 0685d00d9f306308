//! Reaction-rate model evaluation.
//!
//! The model predicts the heat release rate from the extent of reaction:
//!
//! ```text
//! HRR(T) = Δq · A · (1 - α)^n · (α^m + α_zv) · exp(-Ea / (R·T))
//! ```
//!
//! with `α` the cumulative conversion computed from the observed curve itself.
//!
//! Numerical notes:
//! - `α` is clipped to `[0, 1]`, so both power bases are non-negative.
//! - Powers use the `0^0 = 1` convention: a zero reaction order makes the
//!   factor exactly `1`, even at `α ∈ {0, 1}`.

use crate::domain::ModelParameters;
use crate::math::cumtrapz;

/// Gas constant (J/(mol·K)).
pub const GAS_CONSTANT: f64 = 8.314;

/// Offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// `base^exponent` for `base ≥ 0`, `exponent ≥ 0`, with `0^0 = 1`.
pub fn pow_order(base: f64, exponent: f64) -> f64 {
    if exponent == 0.0 {
        return 1.0;
    }
    base.powf(exponent)
}

/// Cumulative conversion `α[i] = (1/β) · ∫_{T0}^{Ti} HRR dT / Δq`, clipped to `[0, 1]`.
///
/// Returns an empty vector when the inputs are misaligned.
pub fn conversion(hrr: &[f64], temperature_k: &[f64], delta_q: f64, heating_rate: f64) -> Vec<f64> {
    raw_conversion(hrr, temperature_k, delta_q, heating_rate)
        .into_iter()
        .map(|a| a.clamp(0.0, 1.0))
        .collect()
}

/// Conversion before clipping (useful for diagnostics and monotonicity checks).
pub fn raw_conversion(hrr: &[f64], temperature_k: &[f64], delta_q: f64, heating_rate: f64) -> Vec<f64> {
    let Some(cum) = cumtrapz(hrr, temperature_k) else {
        return Vec::new();
    };
    cum.into_iter()
        .map(|c| (1.0 / heating_rate) * c / delta_q)
        .collect()
}

/// Rate at a single point given its conversion and temperature.
pub fn rate_at(params: &ModelParameters, alpha: f64, temperature_k: f64, delta_q: f64) -> f64 {
    let ea = params.ea();
    delta_q
        * params.a
        * pow_order(1.0 - alpha, params.n)
        * (pow_order(alpha, params.m) + params.alpha_zv)
        * (-ea / (GAS_CONSTANT * temperature_k)).exp()
}

/// Predicted HRR for a precomputed conversion sequence.
pub fn predict_with_conversion(
    params: &ModelParameters,
    temperature_k: &[f64],
    alpha: &[f64],
    delta_q: f64,
) -> Vec<f64> {
    temperature_k
        .iter()
        .zip(alpha.iter())
        .map(|(&t, &a)| rate_at(params, a, t, delta_q))
        .collect()
}

/// Predicted HRR over the experiment.
///
/// `α` is re-derived from `(hrr, temperature_k, delta_q, heating_rate)` on
/// every call, so any trial parameter vector is evaluated against the same
/// experimental curve.
pub fn predict_hrr(
    params: &ModelParameters,
    temperature_k: &[f64],
    hrr: &[f64],
    delta_q: f64,
    heating_rate: f64,
) -> Vec<f64> {
    let alpha = conversion(hrr, temperature_k, delta_q, heating_rate);
    predict_with_conversion(params, temperature_k, &alpha, delta_q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n: f64, m: f64) -> ModelParameters {
        ModelParameters {
            a: 1e11,
            log_ea: 1e5_f64.ln(),
            n,
            m,
            alpha_zv: 0.1,
        }
    }

    #[test]
    fn zero_order_at_boundaries_is_finite() {
        let p = params(0.0, 0.0);
        for alpha in [0.0, 1.0] {
            let r = rate_at(&p, alpha, 600.0, 1000.0);
            assert!(r.is_finite());
            // (1-α)^0 = 1, α^0 = 1
            let expected = 1000.0 * 1e11 * (1.0 + 0.1) * (-1e5 / (GAS_CONSTANT * 600.0)).exp();
            assert!((r - expected).abs() <= expected * 1e-12);
        }
    }

    #[test]
    fn pow_order_convention() {
        assert_eq!(pow_order(0.0, 0.0), 1.0);
        assert_eq!(pow_order(0.0, 2.0), 0.0);
        assert_eq!(pow_order(0.25, 0.5), 0.5);
    }

    #[test]
    fn prediction_is_aligned_and_finite() {
        let t_k: Vec<f64> = [20.0, 40.0, 60.0, 80.0, 100.0].iter().map(|t| t + KELVIN_OFFSET).collect();
        let hrr = [0.0, 1.0, 5.0, 3.0, 0.5];
        let beta = 0.1667;
        let delta_q = crate::math::trapz(&hrr.map(|h| h / beta), &t_k).unwrap();

        for (n, m) in [(0.0, 0.0), (1.0, 1.0), (5.0, 0.0), (0.0, 5.0), (2.5, 0.3)] {
            let out = predict_hrr(&params(n, m), &t_k, &hrr, delta_q, beta);
            assert_eq!(out.len(), hrr.len());
            assert!(out.iter().all(|v| v.is_finite()), "n={n} m={m}: {out:?}");
        }
    }

    #[test]
    fn conversion_is_clipped() {
        let t_k = [300.0, 310.0, 320.0];
        let hrr = [1.0, 1.0, 1.0];
        // Deliberately too small Δq: the raw conversion overshoots 1.
        let alpha = conversion(&hrr, &t_k, 5.0, 1.0);
        assert_eq!(alpha, vec![0.0, 1.0, 1.0]);

        // Negative noise pulls the raw value below zero.
        let alpha = conversion(&[0.0, -1.0, 4.0], &t_k, 10.0, 1.0);
        assert_eq!(alpha[0], 0.0);
        assert_eq!(alpha[1], 0.0);
        assert!(alpha.iter().all(|a| (0.0..=1.0).contains(a)));
    }
}
