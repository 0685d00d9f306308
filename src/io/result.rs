//! Read/write fit result JSON files.
//!
//! A result file carries the fitted parameters, diagnostics and the rendered
//! curve, so a fit can be redrawn later without re-running the optimizer.
//! The schema is defined by `domain::ResultFile`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::Utc;

use crate::domain::{FitResult, RenderedCurve, ResultFile};
use crate::error::AppError;

pub const TOOL_NAME: &str = "pyro";

pub fn build_result_file(
    source: Option<&Path>,
    heating_rate: f64,
    result: &FitResult,
    curve: &RenderedCurve,
) -> ResultFile {
    ResultFile {
        tool: TOOL_NAME.to_string(),
        generated_at: Utc::now(),
        source: source.map(|p| p.display().to_string()),
        heating_rate,
        method: result.method,
        result: result.clone(),
        curve: curve.clone(),
    }
}

/// Write a result JSON file.
pub fn write_result_json(path: &Path, file: &ResultFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut writer, file)
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))
}

/// Read a result JSON file.
pub fn read_result_json(path: &Path) -> Result<ResultFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open result JSON '{}': {e}", path.display())))?;
    let parsed: ResultFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid result JSON: {e}")))?;

    if parsed.curve.actual_hrr.len() != parsed.curve.len() || parsed.curve.predicted_hrr.len() != parsed.curve.len() {
        return Err(AppError::new(2, "Invalid result JSON: curve columns have different lengths."));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExperimentSeries, FitMethod, ModelParameters, ParamBounds};
    use crate::fit::FitEngine;

    #[test]
    fn result_file_survives_disk() {
        let series =
            ExperimentSeries::from_columns(&[20.0, 40.0, 60.0, 80.0, 100.0], &[0.0, 1.0, 5.0, 3.0, 0.5]).unwrap();
        let mut engine = FitEngine::new(series, 0.1667);
        let result = engine
            .fit(FitMethod::LeastSquares, &ParamBounds::default(), ModelParameters::default())
            .unwrap()
            .clone();
        let curve = engine.render().unwrap();

        let file = build_result_file(Some(Path::new("run.txt")), 0.1667, &result, &curve);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_result_json(&path, &file).unwrap();

        let back = read_result_json(&path).unwrap();
        assert_eq!(back.tool, "pyro");
        assert_eq!(back.source.as_deref(), Some("run.txt"));
        assert_eq!(back.generated_at, file.generated_at);
        assert_eq!(back.method, FitMethod::LeastSquares);
        assert_eq!(back.curve.len(), 5);
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-12 * (1.0 + b.abs());
        assert!(close(back.result.parameters.ea, result.parameters.ea));
        assert!(close(back.result.parameters.a, result.parameters.a));
        assert!(close(back.result.quality.sse, result.quality.sse));
        for (a, b) in back.curve.predicted_hrr.iter().zip(curve.predicted_hrr.iter()) {
            assert!(close(*a, *b));
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"least squares\""));
    }

    #[test]
    fn malformed_json_is_exit_code_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"tool\": 1}").unwrap();
        assert_eq!(read_result_json(&path).unwrap_err().exit_code(), 2);
        assert_eq!(read_result_json(&dir.path().join("nope.json")).unwrap_err().exit_code(), 2);
    }
}
