//! Export the rendered curve to CSV.
//!
//! One row per experiment sample, easy to load in spreadsheets or plotting scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::RenderedCurve;
use crate::error::AppError;

pub const CURVE_CSV_HEADER: &str = "temperature_c,actual_hrr,predicted_hrr";

/// Write observed and predicted HRR to a CSV file.
pub fn write_curve_csv(path: &Path, curve: &RenderedCurve) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_curve(BufWriter::new(file), curve)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV '{}': {e}", path.display())))
}

fn write_curve<W: Write>(mut out: W, curve: &RenderedCurve) -> std::io::Result<()> {
    writeln!(out, "{CURVE_CSV_HEADER}")?;
    for i in 0..curve.len() {
        writeln!(
            out,
            "{},{},{:.10e}",
            curve.temperature_c[i], curve.actual_hrr[i], curve.predicted_hrr[i]
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_row_per_sample() {
        let curve = RenderedCurve {
            temperature_c: vec![20.0, 40.0],
            actual_hrr: vec![0.0, 1.5],
            predicted_hrr: vec![0.25, 1.0],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.csv");
        write_curve_csv(&path, &curve).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CURVE_CSV_HEADER);
        assert_eq!(lines[1], "20,0,2.5000000000e-1");
        assert_eq!(lines[2], "40,1.5,1.0000000000e0");
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let curve = RenderedCurve {
            temperature_c: vec![],
            actual_hrr: vec![],
            predicted_hrr: vec![],
        };
        let dir = tempfile::tempdir().unwrap();
        let err = write_curve_csv(&dir.path().join("missing").join("curve.csv"), &curve).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
