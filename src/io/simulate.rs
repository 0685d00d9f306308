//! Synthetic experiment generation.
//!
//! Integrates the reaction-rate law over a linear temperature ramp,
//!
//! ```text
//! dα/dT = (A / β) · (1 - α)^n · (α^m + α_zv) · exp(-Ea / (R·T))
//! ```
//!
//! and reports `HRR = β · Δq · dα/dT` with optional Gaussian noise. Files are
//! written in the same layout `io::ingest` reads, which makes them handy for
//! demos and end-to-end tests.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ExperimentSeries, ModelParameters, Sample};
use crate::error::AppError;
use crate::io::ingest::{HRR_COLUMN, TEMPERATURE_COLUMN};
use crate::models::{GAS_CONSTANT, KELVIN_OFFSET, pow_order};

/// RK4 sub-steps between two output samples.
const SUBSTEPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSpec {
    pub params: ModelParameters,
    /// Total heat released (J/g).
    pub delta_q: f64,
    /// Heating rate (K/s).
    pub heating_rate: f64,
    pub t_start_c: f64,
    pub t_end_c: f64,
    pub n_points: usize,
    /// Standard deviation of the additive HRR noise (W/g).
    pub noise: f64,
    pub seed: u64,
}

impl Default for SimulationSpec {
    fn default() -> Self {
        Self {
            params: ModelParameters {
                a: 1e10,
                log_ea: 1.5e5_f64.ln(),
                n: 1.0,
                m: 0.0,
                alpha_zv: 0.0,
            },
            delta_q: 1000.0,
            heating_rate: 0.1667,
            t_start_c: 100.0,
            t_end_c: 600.0,
            n_points: 501,
            noise: 0.0,
            seed: 7,
        }
    }
}

impl SimulationSpec {
    fn validate(&self) -> Result<(), AppError> {
        if self.n_points < 2 {
            return Err(AppError::new(2, "Simulation needs at least 2 points."));
        }
        if !(self.t_start_c.is_finite() && self.t_end_c.is_finite() && self.t_end_c > self.t_start_c) {
            return Err(AppError::new(2, "Invalid temperature range for simulation."));
        }
        if !(self.heating_rate.is_finite() && self.heating_rate > 0.0) {
            return Err(AppError::new(2, "Simulation heating rate must be finite and > 0."));
        }
        if !(self.delta_q.is_finite() && self.delta_q > 0.0) {
            return Err(AppError::new(2, "Simulation Δq must be finite and > 0."));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(AppError::new(2, "Simulation noise must be finite and >= 0."));
        }
        Ok(())
    }
}

/// `dα/dT` at one state.
fn conversion_rate(params: &ModelParameters, heating_rate: f64, alpha: f64, temperature_k: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    (params.a / heating_rate)
        * pow_order(1.0 - alpha, params.n)
        * (pow_order(alpha, params.m) + params.alpha_zv)
        * (-params.ea() / (GAS_CONSTANT * temperature_k)).exp()
}

/// Generate a synthetic `(temperature, HRR)` series.
pub fn simulate_experiment(spec: &SimulationSpec) -> Result<ExperimentSeries, AppError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise.max(f64::MIN_POSITIVE))
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let dt = (spec.t_end_c - spec.t_start_c) / (spec.n_points - 1) as f64;
    let h = dt / SUBSTEPS as f64;
    let rate = |alpha: f64, t_k: f64| conversion_rate(&spec.params, spec.heating_rate, alpha, t_k);

    let mut samples = Vec::with_capacity(spec.n_points);
    let mut alpha = 0.0_f64;

    for i in 0..spec.n_points {
        let t_c = spec.t_start_c + i as f64 * dt;
        let t_k = t_c + KELVIN_OFFSET;

        let mut hrr = spec.heating_rate * spec.delta_q * rate(alpha, t_k);
        if spec.noise > 0.0 {
            hrr += normal.sample(&mut rng);
        }
        samples.push(Sample { temperature_c: t_c, hrr });

        if i + 1 < spec.n_points {
            let mut t = t_k;
            for _ in 0..SUBSTEPS {
                let k1 = rate(alpha, t);
                let k2 = rate(alpha + 0.5 * h * k1, t + 0.5 * h);
                let k3 = rate(alpha + 0.5 * h * k2, t + 0.5 * h);
                let k4 = rate(alpha + h * k3, t + h);
                alpha = (alpha + h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4)).clamp(0.0, 1.0);
                t += h;
            }
        }
    }

    tracing::debug!(points = samples.len(), final_alpha = alpha, "synthetic experiment generated");
    Ok(ExperimentSeries::new(samples))
}

/// Write a series in the experiment-file layout (10 header lines, column row, rows).
pub fn write_experiment_file(path: &Path, series: &ExperimentSeries, spec: &SimulationSpec) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create experiment file '{}': {e}", path.display())))?;
    write_experiment(BufWriter::new(file), series, spec)
        .map_err(|e| AppError::new(2, format!("Failed to write experiment file '{}': {e}", path.display())))
}

fn write_experiment<W: Write>(mut out: W, series: &ExperimentSeries, spec: &SimulationSpec) -> std::io::Result<()> {
    let p = spec.params.to_physical();
    writeln!(out, "#Sample: synthetic")?;
    writeln!(out, "#Generator: pyro simulate")?;
    writeln!(out, "#Generated: {}", Utc::now().to_rfc3339())?;
    writeln!(out, "#Heating Rate: {}", spec.heating_rate)?;
    writeln!(out, "#A: {:e}", p.a)?;
    writeln!(out, "#Ea: {:e}", p.ea)?;
    writeln!(out, "#Orders: n={} m={}", p.n, p.m)?;
    writeln!(out, "#alpha_zv: {}", p.alpha_zv)?;
    writeln!(out, "#Noise: {} (seed {})", spec.noise, spec.seed)?;
    writeln!(out, "#Delta_q: {}", spec.delta_q)?;
    writeln!(out, "Time (s)\t{TEMPERATURE_COLUMN}\t{HRR_COLUMN}")?;

    let t0 = series.samples().first().map(|s| s.temperature_c).unwrap_or(0.0);
    for s in series.samples() {
        let time = (s.temperature_c - t0) / spec.heating_rate;
        writeln!(out, "{time:.3}\t{}\t{}", s.temperature_c, s.hrr)?;
    }
    out.flush()
}
