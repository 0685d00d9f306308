//! Optimization dispatch and the stateful fit engine.
//!
//! [`fit_series`] is the stateless core: derive, dispatch to a solver, unpack.
//! [`FitEngine`] owns one experiment and the latest successful result, which
//! the render step needs.

use std::collections::HashMap;

use crate::domain::{
    ExperimentSeries, FitMethod, FitResult, ModelParameters, ParamBounds, ParamName, RenderedCurve,
};
use crate::error::FitError;
use crate::fit::bounds::BoxScaling;
use crate::fit::derived::{compute_derived, to_kelvin};
use crate::fit::evolution::{EvolutionOptions, differential_evolution};
use crate::fit::least_squares::{LeastSquaresOptions, least_squares};
use crate::fit::objective::Objective;
use crate::fit::solve::SolverOutcome;
use crate::fit::tnc::{TncOptions, minimize_tnc};
use crate::models::predict_hrr;

/// Fit the reaction-rate model to one experiment.
///
/// `seed` only affects [`FitMethod::DifferentialEvolution`], which also
/// ignores `guess`.
pub fn fit_series(
    series: &ExperimentSeries,
    heating_rate: f64,
    method: FitMethod,
    bounds: &ParamBounds,
    guess: ModelParameters,
    seed: Option<u64>,
) -> Result<FitResult, FitError> {
    bounds.validate()?;
    if let Some(name) = ParamName::ALL.into_iter().find(|&p| !guess.get(p).is_finite()) {
        return Err(FitError::InvalidInput(format!(
            "initial guess for {} is not finite",
            name.key()
        )));
    }
    let derived = compute_derived(series, heating_rate)?;
    let hrr = series.hrr();
    let objective = Objective::new(&hrr, &derived);
    let scaling = BoxScaling::new(bounds);

    let (start, clipped) = bounds.clip(guess);
    if method.uses_initial_guess() && !clipped.is_empty() {
        let names: Vec<&str> = clipped.iter().map(|p| p.key()).collect();
        tracing::warn!(parameters = ?names, "initial guess outside bounds; clipped into the box");
    }
    let u0 = scaling.to_unit(&start);

    tracing::info!(%method, samples = hrr.len(), delta_q = derived.delta_q, "fitting");

    let outcome = run_solver(method, &objective, &scaling, &u0, seed);

    let internal = scaling.from_unit(&outcome.u);
    let quality = objective.quality(&internal);
    if !quality.sse.is_finite() {
        return Err(FitError::NumericDegenerate(format!(
            "loss is not finite at the fitted parameters ({})",
            outcome.message
        )));
    }

    tracing::info!(
        %method,
        sse = quality.sse,
        iterations = outcome.iterations,
        evaluations = outcome.evaluations,
        converged = outcome.converged,
        "fit finished"
    );

    Ok(FitResult {
        method,
        parameters: internal.to_physical(),
        internal,
        delta_q: derived.delta_q,
        quality,
        solver: outcome.report(),
    })
}

fn run_solver(
    method: FitMethod,
    objective: &Objective<'_>,
    scaling: &BoxScaling,
    u0: &[f64],
    seed: Option<u64>,
) -> SolverOutcome {
    let scalar = |u: &[f64]| objective.loss(&scaling.from_unit(u));
    match method {
        FitMethod::Minimize => minimize_tnc(scalar, u0, &TncOptions::default()),
        FitMethod::LeastSquares => {
            let opts = LeastSquaresOptions::for_problem(u0.len(), objective.len());
            least_squares(|u: &[f64]| objective.residuals(&scaling.from_unit(u)), u0, &opts)
        }
        FitMethod::DifferentialEvolution => {
            let opts = EvolutionOptions {
                seed,
                ..EvolutionOptions::default()
            };
            differential_evolution(scalar, u0.len(), &opts)
        }
    }
}

/// Holds one experiment and the latest successful fit.
#[derive(Debug, Clone)]
pub struct FitEngine {
    series: ExperimentSeries,
    heating_rate: f64,
    seed: Option<u64>,
    fitted: Option<Fitted>,
}

/// A result together with the heating rate it was fitted at.
#[derive(Debug, Clone)]
struct Fitted {
    result: FitResult,
    heating_rate: f64,
}

impl FitEngine {
    pub fn new(series: ExperimentSeries, heating_rate: f64) -> Self {
        Self {
            series,
            heating_rate,
            seed: None,
            fitted: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn series(&self) -> &ExperimentSeries {
        &self.series
    }

    pub fn heating_rate(&self) -> f64 {
        self.heating_rate
    }

    /// Takes effect on the next fit; the stored result still renders at the
    /// rate it was fitted with.
    pub fn set_heating_rate(&mut self, heating_rate: f64) {
        self.heating_rate = heating_rate;
    }

    pub fn result(&self) -> Option<&FitResult> {
        self.fitted.as_ref().map(|f| &f.result)
    }

    /// Run one fit; on failure the previous result is kept.
    pub fn fit(
        &mut self,
        method: FitMethod,
        bounds: &ParamBounds,
        guess: ModelParameters,
    ) -> Result<&FitResult, FitError> {
        let result = fit_series(&self.series, self.heating_rate, method, bounds, guess, self.seed)?;
        let fitted = self.fitted.insert(Fitted {
            result,
            heating_rate: self.heating_rate,
        });
        Ok(&fitted.result)
    }

    /// [`FitEngine::fit`] with a method name and a name-keyed bounds map.
    pub fn fit_named(
        &mut self,
        method: &str,
        bounds: &HashMap<String, (f64, f64)>,
        guess: ModelParameters,
    ) -> Result<&FitResult, FitError> {
        let method: FitMethod = method.parse()?;
        let bounds = ParamBounds::from_map(bounds)?;
        self.fit(method, &bounds, guess)
    }

    /// Observed and predicted HRR at the fitted parameters.
    pub fn render(&self) -> Result<RenderedCurve, FitError> {
        let Fitted { result, heating_rate } = self.fitted.as_ref().ok_or(FitError::NotFitted)?;

        let temperature_c = self.series.temperatures_c();
        let actual_hrr = self.series.hrr();
        let temperature_k = to_kelvin(&temperature_c);
        let predicted_hrr = predict_hrr(
            &result.internal,
            &temperature_k,
            &actual_hrr,
            result.delta_q,
            *heating_rate,
        );

        Ok(RenderedCurve {
            temperature_c,
            actual_hrr,
            predicted_hrr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BETA: f64 = 0.1667;

    fn scenario() -> ExperimentSeries {
        ExperimentSeries::from_columns(&[20.0, 40.0, 60.0, 80.0, 100.0], &[0.0, 1.0, 5.0, 3.0, 0.5]).unwrap()
    }

    fn initial_loss(guess: ModelParameters) -> f64 {
        let series = scenario();
        let derived = compute_derived(&series, BETA).unwrap();
        let hrr = series.hrr();
        Objective::new(&hrr, &derived).loss(&guess)
    }

    #[test]
    fn render_before_fit_is_not_fitted() {
        let engine = FitEngine::new(scenario(), BETA);
        assert_eq!(engine.render(), Err(FitError::NotFitted));
    }

    #[test]
    fn bogus_method_keeps_previous_result() {
        let mut engine = FitEngine::new(scenario(), BETA);
        let bounds = ParamBounds::default();
        let previous = engine
            .fit(FitMethod::LeastSquares, &bounds, ModelParameters::default())
            .unwrap()
            .clone();

        let err = engine
            .fit_named("bogus", &bounds.to_map(), ModelParameters::default())
            .unwrap_err();
        assert_eq!(err, FitError::InvalidMethod("bogus".to_string()));
        assert_eq!(engine.result(), Some(&previous));
    }

    #[test]
    fn deterministic_methods_are_idempotent() {
        let bounds = ParamBounds::default();
        for method in [FitMethod::Minimize, FitMethod::LeastSquares] {
            let mut engine = FitEngine::new(scenario(), BETA);
            let first = engine.fit(method, &bounds, ModelParameters::default()).unwrap().clone();
            let second = engine.fit(method, &bounds, ModelParameters::default()).unwrap().clone();
            assert_eq!(first, second, "{method}");
        }
    }

    #[test]
    fn local_methods_never_end_above_the_start() {
        let bounds = ParamBounds::default();
        let guess = ModelParameters::default();
        let start = initial_loss(guess);
        for method in [FitMethod::Minimize, FitMethod::LeastSquares] {
            let result = fit_series(&scenario(), BETA, method, &bounds, guess, None).unwrap();
            assert!(result.quality.sse <= start, "{method}: {} > {start}", result.quality.sse);
            assert_eq!(result.quality.n, 5);
        }
    }

    #[test]
    fn seeded_evolution_is_reproducible_and_beats_zero_prediction() {
        let bounds = ParamBounds::default();
        let guess = ModelParameters::default();
        let a = fit_series(&scenario(), BETA, FitMethod::DifferentialEvolution, &bounds, guess, Some(11)).unwrap();
        let b = fit_series(&scenario(), BETA, FitMethod::DifferentialEvolution, &bounds, guess, Some(11)).unwrap();
        assert_eq!(a, b);

        // Predicting zero everywhere costs Σ HRR² = 35.25.
        assert!(a.quality.sse <= 35.25 * 1.001, "sse = {}", a.quality.sse);
    }

    #[test]
    fn reported_parameters_are_inside_bounds_and_round_trip() {
        let bounds = ParamBounds::default();
        let mut engine = FitEngine::new(scenario(), BETA);
        let result = engine
            .fit(FitMethod::LeastSquares, &bounds, ModelParameters::default())
            .unwrap()
            .clone();

        let (lower, upper) = bounds.lower_upper();
        for (i, x) in result.internal.to_array().iter().enumerate() {
            assert!(*x >= lower[i] && *x <= upper[i], "param {i} = {x}");
        }
        assert_eq!(result.parameters.ea, result.internal.log_ea.exp());
        assert!((result.parameters.ea.ln() - result.internal.log_ea).abs() < 1e-12);
        assert!((result.delta_q - 185.0 / BETA).abs() < 1e-9);

        let curve = engine.render().unwrap();
        assert_eq!(curve.len(), 5);
        assert_eq!(curve.temperature_c, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
        assert_eq!(curve.actual_hrr, vec![0.0, 1.0, 5.0, 3.0, 0.5]);
        assert!(curve.predicted_hrr.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn input_errors_surface_before_solving() {
        let mut engine = FitEngine::new(scenario(), 0.0);
        let err = engine
            .fit(FitMethod::Minimize, &ParamBounds::default(), ModelParameters::default())
            .unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
        assert!(engine.result().is_none());

        let short = ExperimentSeries::from_columns(&[20.0], &[1.0]).unwrap();
        let err = fit_series(
            &short,
            BETA,
            FitMethod::LeastSquares,
            &ParamBounds::default(),
            ModelParameters::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));

        let mut bad = ParamBounds::default().to_map();
        bad.insert("n".to_string(), (4.0, 1.0));
        let mut engine = FitEngine::new(scenario(), BETA);
        assert!(matches!(
            engine.fit_named("minimize", &bad, ModelParameters::default()),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn heating_rate_change_applies_on_next_fit() {
        let bounds = ParamBounds::default();
        let mut engine = FitEngine::new(scenario(), BETA);
        engine.fit(FitMethod::LeastSquares, &bounds, ModelParameters::default()).unwrap();

        engine.set_heating_rate(2.0 * BETA);
        assert!((engine.result().unwrap().delta_q - 185.0 / BETA).abs() < 1e-9);

        let refit = engine.fit(FitMethod::LeastSquares, &bounds, ModelParameters::default()).unwrap();
        assert!((refit.delta_q - 185.0 / (2.0 * BETA)).abs() < 1e-9);
        assert_eq!(engine.series().len(), 5);
    }

    #[test]
    fn render_uses_the_fitted_heating_rate() {
        let mut engine = FitEngine::new(scenario(), BETA);
        engine
            .fit(FitMethod::LeastSquares, &ParamBounds::default(), ModelParameters::default())
            .unwrap();
        let before = engine.render().unwrap();

        engine.set_heating_rate(2.0 * BETA);
        assert_eq!(engine.render().unwrap(), before);

        engine.set_heating_rate(0.0);
        assert_eq!(engine.render().unwrap(), before);
    }

    #[test]
    fn non_finite_guess_is_invalid_input() {
        let bounds = ParamBounds::default();
        for method in FitMethod::ALL {
            let guess = ModelParameters {
                n: f64::NAN,
                ..ModelParameters::default()
            };
            let err = fit_series(&scenario(), BETA, method, &bounds, guess, Some(1)).unwrap_err();
            assert!(matches!(err, FitError::InvalidInput(ref msg) if msg.contains("n")), "{method}: {err:?}");
        }

        let guess = ModelParameters {
            a: f64::INFINITY,
            ..ModelParameters::default()
        };
        let mut engine = FitEngine::new(scenario(), BETA);
        assert!(matches!(
            engine.fit(FitMethod::Minimize, &bounds, guess),
            Err(FitError::InvalidInput(_))
        ));
        assert!(engine.result().is_none());
    }

    #[test]
    fn evolution_ignores_the_initial_guess() {
        let bounds = ParamBounds::default();
        let low = ModelParameters {
            a: 1.0,
            n: 0.0,
            m: 0.0,
            alpha_zv: 0.0,
            ..ModelParameters::default()
        };
        let high = ModelParameters {
            a: 1e12,
            n: 5.0,
            m: 5.0,
            alpha_zv: 1.0,
            ..ModelParameters::default()
        };
        let a = fit_series(&scenario(), BETA, FitMethod::DifferentialEvolution, &bounds, low, Some(5)).unwrap();
        let b = fit_series(&scenario(), BETA, FitMethod::DifferentialEvolution, &bounds, high, Some(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_box_guess_is_clipped() {
        let guess = ModelParameters {
            a: 1e15,
            n: 9.0,
            ..ModelParameters::default()
        };
        let result = fit_series(&scenario(), BETA, FitMethod::Minimize, &ParamBounds::default(), guess, None).unwrap();
        assert!(result.parameters.a <= 1e12);
        assert!(result.parameters.n <= 5.0);
    }
}
