//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Lower/upper limits of the pre-exponential factor `A`.
pub const DEFAULT_A_BOUNDS: (f64, f64) = (1e10, 1e12);
/// Activation energy limits (J/mol); the optimizer sees their logarithms.
pub const DEFAULT_EA_BOUNDS: (f64, f64) = (4e3, 4e5);
pub const DEFAULT_ORDER_BOUNDS: (f64, f64) = (0.0, 5.0);
pub const DEFAULT_ALPHA_ZV_BOUNDS: (f64, f64) = (-1.0, 1.0);

pub const DEFAULT_A_GUESS: f64 = 1e11;
/// Activation energy guess (J/mol).
pub const DEFAULT_EA_GUESS: f64 = 1e4;
pub const DEFAULT_ORDER_GUESS: f64 = 1.0;
pub const DEFAULT_ALPHA_ZV_GUESS: f64 = 0.3;

/// One row of the experiment table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Furnace temperature (°C).
    pub temperature_c: f64,
    /// Heat release rate (W/g).
    pub hrr: f64,
}

/// Ordered `(temperature, HRR)` samples of one controlled-ramp experiment.
///
/// The series is never mutated by fitting; derived columns live in
/// [`DerivedCurve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentSeries {
    samples: Vec<Sample>,
}

impl ExperimentSeries {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Build a series from two parallel columns.
    pub fn from_columns(temperature_c: &[f64], hrr: &[f64]) -> Result<Self, FitError> {
        if temperature_c.len() != hrr.len() {
            return Err(FitError::InvalidInput(format!(
                "column length mismatch: {} temperatures vs {} HRR values",
                temperature_c.len(),
                hrr.len()
            )));
        }
        let samples = temperature_c
            .iter()
            .zip(hrr.iter())
            .map(|(&temperature_c, &hrr)| Sample { temperature_c, hrr })
            .collect();
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn temperatures_c(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.temperature_c).collect()
    }

    pub fn hrr(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.hrr).collect()
    }

    /// Check the invariants the fitting core relies on.
    ///
    /// Requires at least two samples, finite values, and a non-decreasing
    /// temperature ramp.
    pub fn validate(&self) -> Result<(), FitError> {
        if self.samples.len() < 2 {
            return Err(FitError::InvalidInput(format!(
                "experiment series needs at least 2 samples, got {}",
                self.samples.len()
            )));
        }
        for (i, s) in self.samples.iter().enumerate() {
            if !s.temperature_c.is_finite() || !s.hrr.is_finite() {
                return Err(FitError::InvalidInput(format!("non-finite value at sample {i}")));
            }
        }
        for (i, pair) in self.samples.windows(2).enumerate() {
            if pair[1].temperature_c < pair[0].temperature_c {
                return Err(FitError::InvalidInput(format!(
                    "temperature decreases between samples {i} and {} ({} -> {} °C)",
                    i + 1,
                    pair[0].temperature_c,
                    pair[1].temperature_c
                )));
            }
        }
        Ok(())
    }
}

/// The five fitted quantities, in solver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamName {
    A,
    LogEa,
    N,
    M,
    AlphaZv,
}

impl ParamName {
    /// Solver vector order: `[A, logEa, n, m, alpha_zv]`.
    pub const ALL: [ParamName; 5] = [
        ParamName::A,
        ParamName::LogEa,
        ParamName::N,
        ParamName::M,
        ParamName::AlphaZv,
    ];

    /// Key used in bounds mappings.
    pub fn key(self) -> &'static str {
        match self {
            ParamName::A => "A",
            ParamName::LogEa => "logEa",
            ParamName::N => "n",
            ParamName::M => "m",
            ParamName::AlphaZv => "alpha_zv",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ParamName::A => 0,
            ParamName::LogEa => 1,
            ParamName::N => 2,
            ParamName::M => 3,
            ParamName::AlphaZv => 4,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Model parameters as the optimizer sees them (activation energy in log-space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub a: f64,
    pub log_ea: f64,
    pub n: f64,
    pub m: f64,
    pub alpha_zv: f64,
}

impl ModelParameters {
    pub fn from_array(x: [f64; 5]) -> Self {
        Self {
            a: x[0],
            log_ea: x[1],
            n: x[2],
            m: x[3],
            alpha_zv: x[4],
        }
    }

    pub fn to_array(self) -> [f64; 5] {
        [self.a, self.log_ea, self.n, self.m, self.alpha_zv]
    }

    pub fn get(&self, name: ParamName) -> f64 {
        self.to_array()[name.index()]
    }

    pub fn set(&mut self, name: ParamName, value: f64) {
        let mut x = self.to_array();
        x[name.index()] = value;
        *self = Self::from_array(x);
    }

    /// Activation energy `Ea = exp(logEa)`.
    pub fn ea(&self) -> f64 {
        self.log_ea.exp()
    }

    pub fn to_physical(self) -> PhysicalParameters {
        PhysicalParameters {
            a: self.a,
            ea: self.ea(),
            n: self.n,
            m: self.m,
            alpha_zv: self.alpha_zv,
        }
    }
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            a: DEFAULT_A_GUESS,
            log_ea: DEFAULT_EA_GUESS.ln(),
            n: DEFAULT_ORDER_GUESS,
            m: DEFAULT_ORDER_GUESS,
            alpha_zv: DEFAULT_ALPHA_ZV_GUESS,
        }
    }
}

/// Fitted parameters in physical units, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    /// Pre-exponential factor (1/s).
    pub a: f64,
    /// Activation energy (J/mol).
    pub ea: f64,
    pub n: f64,
    pub m: f64,
    pub alpha_zv: f64,
}

impl PhysicalParameters {
    pub fn to_internal(self) -> ModelParameters {
        ModelParameters {
            a: self.a,
            log_ea: self.ea.ln(),
            n: self.n,
            m: self.m,
            alpha_zv: self.alpha_zv,
        }
    }
}

/// Per-parameter `(min, max)` search box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub a: (f64, f64),
    pub log_ea: (f64, f64),
    pub n: (f64, f64),
    pub m: (f64, f64),
    pub alpha_zv: (f64, f64),
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            a: DEFAULT_A_BOUNDS,
            log_ea: (DEFAULT_EA_BOUNDS.0.ln(), DEFAULT_EA_BOUNDS.1.ln()),
            n: DEFAULT_ORDER_BOUNDS,
            m: DEFAULT_ORDER_BOUNDS,
            alpha_zv: DEFAULT_ALPHA_ZV_BOUNDS,
        }
    }
}

impl ParamBounds {
    pub fn get(&self, name: ParamName) -> (f64, f64) {
        match name {
            ParamName::A => self.a,
            ParamName::LogEa => self.log_ea,
            ParamName::N => self.n,
            ParamName::M => self.m,
            ParamName::AlphaZv => self.alpha_zv,
        }
    }

    pub fn set(&mut self, name: ParamName, range: (f64, f64)) {
        match name {
            ParamName::A => self.a = range,
            ParamName::LogEa => self.log_ea = range,
            ParamName::N => self.n = range,
            ParamName::M => self.m = range,
            ParamName::AlphaZv => self.alpha_zv = range,
        }
    }

    /// Build bounds from a name-keyed mapping.
    ///
    /// Exactly the keys `A`, `logEa`, `n`, `m`, `alpha_zv` are accepted.
    pub fn from_map(map: &HashMap<String, (f64, f64)>) -> Result<Self, FitError> {
        if let Some(unknown) = map.keys().find(|k| ParamName::from_key(k).is_none()) {
            return Err(FitError::InvalidInput(format!("unknown bounds key '{unknown}'")));
        }
        let mut bounds = ParamBounds::default();
        for name in ParamName::ALL {
            let range = map
                .get(name.key())
                .copied()
                .ok_or_else(|| FitError::InvalidInput(format!("missing bounds for '{name}'")))?;
            bounds.set(name, range);
        }
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn to_map(&self) -> HashMap<String, (f64, f64)> {
        ParamName::ALL
            .into_iter()
            .map(|name| (name.key().to_string(), self.get(name)))
            .collect()
    }

    /// Parallel lower/upper vectors ordered `[A, logEa, n, m, alpha_zv]`.
    pub fn lower_upper(&self) -> ([f64; 5], [f64; 5]) {
        let mut lower = [0.0; 5];
        let mut upper = [0.0; 5];
        for name in ParamName::ALL {
            let (lo, hi) = self.get(name);
            lower[name.index()] = lo;
            upper[name.index()] = hi;
        }
        (lower, upper)
    }

    pub fn validate(&self) -> Result<(), FitError> {
        for name in ParamName::ALL {
            let (lo, hi) = self.get(name);
            if !lo.is_finite() || !hi.is_finite() {
                return Err(FitError::InvalidInput(format!("bounds for '{name}' must be finite")));
            }
            if lo > hi {
                return Err(FitError::InvalidInput(format!(
                    "bounds for '{name}' are inverted: min {lo} > max {hi}"
                )));
            }
        }
        Ok(())
    }

    /// Project `params` into the box; returns the names that had to move.
    pub fn clip(&self, params: ModelParameters) -> (ModelParameters, Vec<ParamName>) {
        let mut out = params;
        let mut clipped = Vec::new();
        for name in ParamName::ALL {
            let (lo, hi) = self.get(name);
            let v = params.get(name);
            let c = v.clamp(lo, hi);
            if c != v {
                clipped.push(name);
                out.set(name, c);
            }
        }
        (out, clipped)
    }
}

/// Optimization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum FitMethod {
    /// Bounded truncated-Newton minimization of the scalar loss.
    #[serde(rename = "minimize")]
    #[value(name = "minimize", alias = "min")]
    Minimize,
    /// Bounded Levenberg–Marquardt on the residual vector.
    #[serde(rename = "least squares")]
    #[value(name = "least squares", alias = "least-squares", alias = "ls")]
    LeastSquares,
    /// Global population search over the bounds box.
    ///
    /// The initial guess is ignored: the population is sampled from the
    /// whole box. Unseeded runs are nondeterministic.
    #[serde(rename = "differential evolution")]
    #[value(name = "differential evolution", alias = "differential-evolution", alias = "de")]
    DifferentialEvolution,
}

impl FitMethod {
    pub const ALL: [FitMethod; 3] = [
        FitMethod::Minimize,
        FitMethod::LeastSquares,
        FitMethod::DifferentialEvolution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FitMethod::Minimize => "minimize",
            FitMethod::LeastSquares => "least squares",
            FitMethod::DifferentialEvolution => "differential evolution",
        }
    }

    pub fn uses_initial_guess(self) -> bool {
        !matches!(self, FitMethod::DifferentialEvolution)
    }

    pub fn next(self) -> Self {
        match self {
            FitMethod::Minimize => FitMethod::LeastSquares,
            FitMethod::LeastSquares => FitMethod::DifferentialEvolution,
            FitMethod::DifferentialEvolution => FitMethod::Minimize,
        }
    }
}

impl FromStr for FitMethod {
    type Err = FitError;

    /// Exact-name match; no aliases, no default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FitMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| FitError::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantities derived from the raw series for one fit call.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedCurve {
    /// `T_C + 273.15`, aligned with the series.
    pub temperature_k: Vec<f64>,
    /// Total heat released per gram.
    pub delta_q: f64,
    /// Cumulative conversion fraction, clipped to `[0, 1]`.
    pub alpha: Vec<f64>,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    pub n: usize,
}

/// What the solver reported about its run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub message: String,
}

/// Outcome of one successful fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub method: FitMethod,
    /// `(A, Ea, n, m, alpha_zv)` in physical units.
    pub parameters: PhysicalParameters,
    /// The optimized vector in solver (log-space) form.
    pub internal: ModelParameters,
    pub delta_q: f64,
    pub quality: FitQuality,
    pub solver: SolverReport,
}

/// Observed and predicted HRR over the experiment's temperatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedCurve {
    pub temperature_c: Vec<f64>,
    pub actual_hrr: Vec<f64>,
    pub predicted_hrr: Vec<f64>,
}

impl RenderedCurve {
    pub fn len(&self) -> usize {
        self.temperature_c.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_empty()
    }
}

/// Portable fit result: what `--export-result` writes and `pyro plot --result` reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    /// Experiment file the fit was run on, if any.
    pub source: Option<String>,
    pub heating_rate: f64,
    pub method: FitMethod,
    pub result: FitResult,
    pub curve: RenderedCurve,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus `.env` / environment defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Experiment file; `None` means "ask the user".
    pub file: Option<PathBuf>,
    /// Replaces the heating rate found in the file header.
    pub heating_rate: Option<f64>,
    pub method: FitMethod,
    pub bounds: ParamBounds,
    pub guess: ModelParameters,
    /// Differential-evolution seed.
    pub seed: Option<u64>,

    /// Rows in the largest-residual table.
    pub top_n: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_curve: Option<PathBuf>,
    pub export_result: Option<PathBuf>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            file: None,
            heating_rate: None,
            method: FitMethod::LeastSquares,
            bounds: ParamBounds::default(),
            guess: ModelParameters::default(),
            seed: None,
            top_n: 10,
            plot: true,
            plot_width: 100,
            plot_height: 25,
            export_curve: None,
            export_result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_match_exactly() {
        assert_eq!("minimize".parse::<FitMethod>(), Ok(FitMethod::Minimize));
        assert_eq!("least squares".parse::<FitMethod>(), Ok(FitMethod::LeastSquares));
        assert_eq!(
            "differential evolution".parse::<FitMethod>(),
            Ok(FitMethod::DifferentialEvolution)
        );
        assert_eq!(
            "bogus".parse::<FitMethod>(),
            Err(FitError::InvalidMethod("bogus".to_string()))
        );
        assert!("Minimize".parse::<FitMethod>().is_err());
    }

    #[test]
    fn bounds_reformat_to_ordered_vectors() {
        let mut map = HashMap::new();
        map.insert("A".to_string(), (1e10, 1e12));
        map.insert("logEa".to_string(), (4e3_f64.ln(), 4e5_f64.ln()));
        map.insert("n".to_string(), (0.0, 5.0));
        map.insert("m".to_string(), (0.0, 5.0));
        map.insert("alpha_zv".to_string(), (-1.0, 1.0));

        let bounds = ParamBounds::from_map(&map).unwrap();
        let (lower, upper) = bounds.lower_upper();
        assert_eq!(lower, [1e10, 4e3_f64.ln(), 0.0, 0.0, -1.0]);
        assert_eq!(upper, [1e12, 4e5_f64.ln(), 5.0, 5.0, 1.0]);
        assert_eq!(bounds, ParamBounds::default());
    }

    #[test]
    fn bounds_map_rejects_missing_and_unknown_keys() {
        let mut map = ParamBounds::default().to_map();
        map.remove("m");
        assert!(matches!(ParamBounds::from_map(&map), Err(FitError::InvalidInput(_))));

        let mut map = ParamBounds::default().to_map();
        map.insert("Ea".to_string(), (1.0, 2.0));
        assert!(matches!(ParamBounds::from_map(&map), Err(FitError::InvalidInput(_))));

        let mut map = ParamBounds::default().to_map();
        map.insert("n".to_string(), (3.0, 1.0));
        assert!(matches!(ParamBounds::from_map(&map), Err(FitError::InvalidInput(_))));
    }

    #[test]
    fn log_ea_round_trips() {
        for ea in [4e3, 1e4, 1.234e5, 4e5] {
            let internal = PhysicalParameters { a: 1e11, ea, n: 1.0, m: 1.0, alpha_zv: 0.0 }.to_internal();
            let back = internal.to_physical();
            assert!((back.ea - ea).abs() <= ea * 1e-14, "{ea} -> {}", back.ea);
            assert!((back.ea.ln() - internal.log_ea).abs() < 1e-14);
        }
    }

    #[test]
    fn clip_projects_guess_into_box() {
        let bounds = ParamBounds::default();
        let guess = ModelParameters { a: 5e12, n: -1.0, ..ModelParameters::default() };
        let (clipped, names) = bounds.clip(guess);
        assert_eq!(clipped.a, 1e12);
        assert_eq!(clipped.n, 0.0);
        assert_eq!(names, vec![ParamName::A, ParamName::N]);
    }

    #[test]
    fn series_validation() {
        let short = ExperimentSeries::from_columns(&[20.0], &[1.0]).unwrap();
        assert!(matches!(short.validate(), Err(FitError::InvalidInput(_))));

        let decreasing = ExperimentSeries::from_columns(&[20.0, 40.0, 30.0], &[0.0, 1.0, 2.0]).unwrap();
        assert!(matches!(decreasing.validate(), Err(FitError::InvalidInput(_))));

        let ok = ExperimentSeries::from_columns(&[20.0, 40.0, 60.0], &[0.0, 1.0, 2.0]).unwrap();
        assert!(ok.validate().is_ok());

        assert!(ExperimentSeries::from_columns(&[1.0, 2.0], &[1.0]).is_err());
    }
}
