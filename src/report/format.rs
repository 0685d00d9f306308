//! Formatted terminal output: header, fit summary and residual tables.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::domain::{FitResult, ParamName, RenderedCurve, ResultFile};
use crate::io::ingest::ExperimentFile;

/// One row of the largest-residual table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualRow {
    pub index: usize,
    pub temperature_c: f64,
    pub actual: f64,
    pub predicted: f64,
    pub residual: f64,
}

/// Residuals `actual - predicted` sorted by magnitude, largest first.
pub fn largest_residuals(curve: &RenderedCurve, top_n: usize) -> Vec<ResidualRow> {
    let mut rows: Vec<ResidualRow> = (0..curve.len())
        .map(|i| ResidualRow {
            index: i,
            temperature_c: curve.temperature_c[i],
            actual: curve.actual_hrr[i],
            predicted: curve.predicted_hrr[i],
            residual: curve.actual_hrr[i] - curve.predicted_hrr[i],
        })
        .collect();
    rows.sort_by(|a, b| {
        b.residual
            .abs()
            .partial_cmp(&a.residual.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    rows.truncate(top_n);
    rows
}

/// File header as shown to the user.
pub fn format_header(data: &ExperimentFile) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", data.display_name()));
    for line in data.display_header() {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("Columns: {}\n", data.columns.join(" | ")));
    out
}

/// Format the full run summary (dataset stats + fitted parameters + diagnostics).
pub fn format_run_summary(data: &ExperimentFile, heating_rate: f64, result: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== pyro - reaction kinetics fit ===\n");
    out.push_str(&format!("File: {}\n", truncate(&data.display_name(), 60)));
    out.push_str(&format!("Heating rate: {heating_rate}\n"));

    let t = data.series.temperatures_c();
    let h = data.series.hrr();
    out.push_str(&format!(
        "Points: n={} | T=[{:.1}, {:.1}] °C | HRR=[{:.3}, {:.3}] W/g\n",
        data.rows_used,
        t.first().copied().unwrap_or(f64::NAN),
        t.last().copied().unwrap_or(f64::NAN),
        h.iter().copied().fold(f64::INFINITY, f64::min),
        h.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    ));
    if !data.row_errors.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", data.row_errors.len()));
    }

    out.push('\n');
    out.push_str(&format_fit(result));
    out
}

/// Fitted parameters, quality and solver diagnostics.
pub fn format_fit(result: &FitResult) -> String {
    let mut out = String::new();
    let p = result.parameters;

    out.push_str(&format!("Method: {}\n", result.method));
    out.push_str(&format!("Delta_q: {:.4} J/g\n", result.delta_q));
    out.push_str("\nParameters:\n");
    out.push_str(&format!("- {:<9} {:>14.6e} 1/s\n", ParamName::A.key(), p.a));
    out.push_str(&format!("- {:<9} {:>14.6e} J/mol (logEa={:.6})\n", "Ea", p.ea, result.internal.log_ea));
    out.push_str(&format!("- {:<9} {:>14.6}\n", ParamName::N.key(), p.n));
    out.push_str(&format!("- {:<9} {:>14.6}\n", ParamName::M.key(), p.m));
    out.push_str(&format!("- {:<9} {:>14.6}\n", ParamName::AlphaZv.key(), p.alpha_zv));

    out.push_str(&format!(
        "\nQuality: SSE={:.6} RMSE={:.6} R²={:.4} (n={})\n",
        result.quality.sse, result.quality.rmse, result.quality.r_squared, result.quality.n
    ));
    out.push_str(&format!(
        "Solver: iterations={} evaluations={} converged={} ({})\n",
        result.solver.iterations, result.solver.evaluations, result.solver.converged, result.solver.message
    ));
    out
}

/// Summary of a saved result file.
pub fn format_result_file(file: &ResultFile) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== {} result ({}) ===\n",
        file.tool,
        file.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(source) = &file.source {
        out.push_str(&format!("File: {}\n", truncate(source, 60)));
    }
    out.push_str(&format!("Heating rate: {}\n", file.heating_rate));
    out.push_str(&format_fit(&file.result));
    out
}

/// Table of the largest residuals.
pub fn format_residual_table(rows: &[ResidualRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>6} {:>10} {:>12} {:>12} {:>12}\n",
            "row", "T (C)", "HRR obs", "HRR fit", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<10} {:-<12} {:-<12} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>6} {:>10.2} {:>12.4} {:>12.4} {:>12.4}",
                r.index, r.temperature_c, r.actual, r.predicted, r.residual
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_residuals_sorted_by_magnitude() {
        let curve = RenderedCurve {
            temperature_c: vec![20.0, 40.0, 60.0],
            actual_hrr: vec![1.0, 5.0, 2.0],
            predicted_hrr: vec![1.5, 2.0, 4.0],
        };
        let rows = largest_residuals(&curve, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert!((rows[0].residual - 3.0).abs() < 1e-12);
        assert_eq!(rows[1].index, 2);
        assert!((rows[1].residual + 2.0).abs() < 1e-12);
    }

    #[test]
    fn residual_table_layout() {
        let rows = [ResidualRow {
            index: 3,
            temperature_c: 80.0,
            actual: 3.0,
            predicted: 2.5,
            residual: 0.5,
        }];
        let table = format_residual_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("residual"));
        assert_eq!(lines[2], "     3      80.00       3.0000       2.5000       0.5000");
    }

    #[test]
    fn header_lists_name_preamble_and_columns() {
        let data = ExperimentFile {
            source: Some("runs/pet.txt".into()),
            header: vec!["Sample: PET".to_string(), "Gas: N2".to_string(), "---".to_string()],
            heating_rate: Some(0.1667),
            columns: vec!["Temperature (C)".to_string(), "HRR (W/g)".to_string()],
            series: crate::domain::ExperimentSeries::from_columns(&[20.0], &[0.0]).unwrap(),
            row_errors: Vec::new(),
            rows_read: 1,
            rows_used: 1,
        };
        assert_eq!(
            format_header(&data),
            "=== pet.txt ===\nSample: PET\nColumns: Temperature (C) | HRR (W/g)\n"
        );
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
    }
}
