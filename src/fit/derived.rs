//! Derived quantities: Kelvin temperatures, total heat released and conversion.
//!
//! Computed fresh for every fit call from the immutable series and the
//! heating rate; nothing here is cached between calls.

use crate::domain::{DerivedCurve, ExperimentSeries};
use crate::error::FitError;
use crate::math::trapz;
use crate::models::{KELVIN_OFFSET, conversion};

/// Check the heating rate before it is used as a divisor.
pub fn validate_heating_rate(heating_rate: f64) -> Result<(), FitError> {
    if !heating_rate.is_finite() || heating_rate == 0.0 {
        return Err(FitError::InvalidInput(format!(
            "heating rate must be finite and non-zero, got {heating_rate}"
        )));
    }
    Ok(())
}

/// `T_K = T_C + 273.15`, aligned with the input.
pub fn to_kelvin(temperature_c: &[f64]) -> Vec<f64> {
    temperature_c.iter().map(|t| t + KELVIN_OFFSET).collect()
}

/// `Δq = ∫ (HRR / β) dT_K` over the whole series.
pub fn total_heat(hrr: &[f64], temperature_k: &[f64], heating_rate: f64) -> Result<f64, FitError> {
    let scaled: Vec<f64> = hrr.iter().map(|h| h / heating_rate).collect();
    let delta_q = trapz(&scaled, temperature_k).ok_or_else(|| {
        FitError::InvalidInput(format!(
            "total heat needs at least 2 aligned samples, got {}",
            hrr.len()
        ))
    })?;

    if !delta_q.is_finite() || delta_q == 0.0 {
        tracing::warn!(delta_q, "total heat released is degenerate");
        return Err(FitError::NumericDegenerate(format!(
            "total heat released is {delta_q}; the HRR curve has no usable area"
        )));
    }
    Ok(delta_q)
}

/// Derive `(T_K, Δq, α)` for one fit.
pub fn compute_derived(series: &ExperimentSeries, heating_rate: f64) -> Result<DerivedCurve, FitError> {
    series.validate()?;
    validate_heating_rate(heating_rate)?;

    let temperature_k = to_kelvin(&series.temperatures_c());
    let hrr = series.hrr();
    let delta_q = total_heat(&hrr, &temperature_k, heating_rate)?;

    let alpha = conversion(&hrr, &temperature_k, delta_q, heating_rate);
    if alpha.len() != hrr.len() || alpha.iter().any(|a| !a.is_finite()) {
        return Err(FitError::NumericDegenerate("conversion fraction is not finite".to_string()));
    }

    tracing::debug!(samples = hrr.len(), delta_q, "derived quantities computed");

    Ok(DerivedCurve {
        temperature_k,
        delta_q,
        alpha,
    })
}
