//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load experiment -> resolve heating rate -> fit -> render -> exports
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::PathBuf;

use crate::domain::{FitConfig, FitResult, RenderedCurve};
use crate::error::AppError;
use crate::fit::FitEngine;
use crate::io::ingest::{ExperimentFile, load_experiment};

/// All computed outputs of a single `pyro fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub data: ExperimentFile,
    pub heating_rate: f64,
    pub result: FitResult,
    pub curve: RenderedCurve,
}

/// The experiment file to use: `--file` if given, else the interactive picker.
pub fn resolve_input_path(config: &FitConfig) -> Result<PathBuf, AppError> {
    match &config.file {
        Some(path) => crate::cli::picker::validate_experiment_path(path),
        None => crate::cli::picker::prompt_for_experiment_path(),
    }
}

/// Execute the full pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let path = resolve_input_path(config)?;
    let data = load_experiment(&path)?;
    run_fit_with_data(config, data)
}

/// Execute the pipeline on an already loaded experiment.
///
/// Exports configured in `config` are written on success.
pub fn run_fit_with_data(config: &FitConfig, data: ExperimentFile) -> Result<RunOutput, AppError> {
    let heating_rate = data.resolve_heating_rate(config.heating_rate)?;

    let mut engine = FitEngine::new(data.series.clone(), heating_rate).with_seed(config.seed);
    let result = engine.fit(config.method, &config.bounds, config.guess)?.clone();
    let curve = engine.render()?;

    let run = RunOutput {
        data,
        heating_rate,
        result,
        curve,
    };
    write_exports(config, &run)?;
    Ok(run)
}

/// Write the CSV/JSON exports requested by the config.
pub fn write_exports(config: &FitConfig, run: &RunOutput) -> Result<(), AppError> {
    if let Some(path) = &config.export_curve {
        crate::io::export::write_curve_csv(path, &run.curve)?;
        tracing::info!(path = %path.display(), "curve exported");
    }
    if let Some(path) = &config.export_result {
        let file = crate::io::result::build_result_file(
            run.data.source.as_deref(),
            run.heating_rate,
            &run.result,
            &run.curve,
        );
        crate::io::result::write_result_json(path, &file)?;
        tracing::info!(path = %path.display(), "result exported");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitMethod;
    use crate::io::simulate::{SimulationSpec, simulate_experiment, write_experiment_file};

    fn simulated_file(dir: &std::path::Path) -> PathBuf {
        let spec = SimulationSpec {
            n_points: 101,
            ..SimulationSpec::default()
        };
        let series = simulate_experiment(&spec).unwrap();
        let path = dir.join("run.txt");
        write_experiment_file(&path, &series, &spec).unwrap();
        path
    }

    #[test]
    fn pipeline_fits_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let file = simulated_file(dir.path());
        let config = FitConfig {
            file: Some(file.clone()),
            method: FitMethod::LeastSquares,
            export_curve: Some(dir.path().join("curve.csv")),
            export_result: Some(dir.path().join("result.json")),
            ..FitConfig::default()
        };

        let run = run_fit(&config).unwrap();
        assert!((run.heating_rate - 0.1667).abs() < 1e-12);
        assert_eq!(run.curve.len(), 101);
        assert!(run.result.quality.sse.is_finite());

        let saved = crate::io::result::read_result_json(&dir.path().join("result.json")).unwrap();
        assert_eq!(saved.method, FitMethod::LeastSquares);
        assert_eq!(saved.source.as_deref(), Some(file.display().to_string().as_str()));
        let csv = std::fs::read_to_string(dir.path().join("curve.csv")).unwrap();
        assert_eq!(csv.lines().count(), 102);
    }

    #[test]
    fn heating_rate_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = simulated_file(dir.path());
        let data = load_experiment(&file).unwrap();
        let config = FitConfig {
            heating_rate: Some(0.5),
            ..FitConfig::default()
        };
        let run = run_fit_with_data(&config, data).unwrap();
        assert_eq!(run.heating_rate, 0.5);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = FitConfig {
            file: Some(dir.path().join("missing.txt")),
            ..FitConfig::default()
        };
        assert_eq!(run_fit(&config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn zero_heating_rate_maps_to_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let data = load_experiment(&simulated_file(dir.path())).unwrap();
        let config = FitConfig {
            heating_rate: Some(0.0),
            ..FitConfig::default()
        };
        assert_eq!(run_fit_with_data(&config, data).unwrap_err().exit_code(), 3);
    }
}
