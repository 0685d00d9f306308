//! Experiment file ingest.
//!
//! Layout of an experiment file:
//!
//! ```text
//! # free-form metadata            ┐
//! # Heating Rate: 0.1667          │ first 10 lines: `#` header lines
//! # ...                           ┘
//! Time (s)<TAB>Temperature (C)<TAB>HRR (W/g)   line 11: column names
//! 0<TAB>20.0<TAB>0.0                            data rows
//! ```
//!
//! Rows that fail to parse are skipped and reported; the fitting core only
//! ever sees the clean `(temperature, HRR)` series.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::domain::{ExperimentSeries, Sample};
use crate::error::AppError;

/// Header lines plus the column-name row.
pub const PREAMBLE_LINES: usize = 11;

pub const TEMPERATURE_COLUMN: &str = "Temperature (C)";
pub const HRR_COLUMN: &str = "HRR (W/g)";

const HEATING_RATE_KEY: &str = "Heating Rate";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: metadata, clean series and what was skipped.
#[derive(Debug, Clone)]
pub struct ExperimentFile {
    pub source: Option<PathBuf>,
    /// Every `#` line of the preamble, without the `#`.
    pub header: Vec<String>,
    pub heating_rate: Option<f64>,
    pub columns: Vec<String>,
    pub series: ExperimentSeries,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl ExperimentFile {
    /// Header as shown to the user: the last two lines are dropped when
    /// there are more than two.
    pub fn display_header(&self) -> &[String] {
        if self.header.len() > 2 {
            &self.header[..self.header.len() - 2]
        } else {
            &self.header
        }
    }

    /// The heating rate to fit with: the override if given, else the header value.
    pub fn resolve_heating_rate(&self, override_rate: Option<f64>) -> Result<f64, AppError> {
        override_rate.or(self.heating_rate).ok_or_else(|| {
            AppError::new(
                2,
                format!(
                    "No `{HEATING_RATE_KEY}:` line in the file header; pass `--heating-rate` to supply one."
                ),
            )
        })
    }

    pub fn display_name(&self) -> String {
        self.source
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// Load an experiment file from disk.
pub fn load_experiment(path: &Path) -> Result<ExperimentFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open experiment file '{}': {e}", path.display())))?;
    let mut data = parse_experiment(BufReader::new(file))?;
    data.source = Some(path.to_path_buf());

    tracing::info!(
        file = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.rows_used,
        skipped = data.row_errors.len(),
        heating_rate = ?data.heating_rate,
        "experiment loaded"
    );
    Ok(data)
}

/// Parse an experiment from any buffered reader.
pub fn parse_experiment<R: BufRead>(mut reader: R) -> Result<ExperimentFile, AppError> {
    let mut header = Vec::new();
    let mut heating_rate = None;
    let mut column_row = None;

    for line_no in 1..=PREAMBLE_LINES {
        let mut buf = String::new();
        let n = reader
            .read_line(&mut buf)
            .map_err(|e| AppError::new(2, format!("Failed to read line {line_no}: {e}")))?;
        if n == 0 {
            return Err(AppError::new(
                2,
                format!("File ends at line {line_no}; expected {PREAMBLE_LINES} preamble lines before the data."),
            ));
        }

        let line = buf.trim().trim_start_matches('\u{feff}');
        if let Some(meta) = line.strip_prefix('#') {
            let meta = meta.trim();
            if meta.starts_with(HEATING_RATE_KEY) {
                heating_rate = Some(parse_heating_rate(meta).map_err(|e| AppError::new(2, format!("line {line_no}: {e}")))?);
            }
            header.push(meta.to_string());
        }
        if line_no == PREAMBLE_LINES {
            column_row = Some(line.trim_start_matches('#').to_string());
        }
    }

    let columns: Vec<String> = column_row
        .unwrap_or_default()
        .split('\t')
        .map(|c| c.trim().to_string())
        .collect();
    let column_map = build_column_map(&columns);
    let temp_idx = require_column(&column_map, TEMPERATURE_COLUMN)?;
    let hrr_idx = require_column(&column_map, HRR_COLUMN)?;

    let mut table = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in table.records().enumerate() {
        rows_read += 1;
        let fallback_line = PREAMBLE_LINES + idx + 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| PREAMBLE_LINES + p.line() as usize)
                    .unwrap_or(fallback_line);
                row_errors.push(RowError {
                    line,
                    message: format!("parse error: {e}"),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| PREAMBLE_LINES + p.line() as usize)
            .unwrap_or(fallback_line);

        match parse_row(&record, temp_idx, hrr_idx) {
            Ok(sample) => samples.push(sample),
            Err(message) => {
                tracing::warn!(line, %message, "skipping row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    let rows_used = samples.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid data rows in the experiment file."));
    }

    Ok(ExperimentFile {
        source: None,
        header,
        heating_rate,
        columns,
        series: ExperimentSeries::new(samples),
        row_errors,
        rows_read,
        rows_used,
    })
}

/// `Heating Rate: <value> [unit]` → value.
fn parse_heating_rate(meta: &str) -> Result<f64, String> {
    let (_, value) = meta
        .split_once(':')
        .ok_or_else(|| format!("expected `{HEATING_RATE_KEY}:<value>`, got '{meta}'"))?;
    let token = value.split_whitespace().next().unwrap_or("");
    let rate = token
        .parse::<f64>()
        .map_err(|_| format!("invalid heating rate '{}'", value.trim()))?;
    if !rate.is_finite() {
        return Err(format!("invalid heating rate '{}'", value.trim()));
    }
    Ok(rate)
}

fn build_column_map(columns: &[String]) -> HashMap<String, usize> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_column_name(name), idx))
        .collect()
}

fn normalize_column_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn require_column(column_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    column_map
        .get(&normalize_column_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn parse_row(record: &StringRecord, temp_idx: usize, hrr_idx: usize) -> Result<Sample, String> {
    let temperature_c = parse_field(record, temp_idx, TEMPERATURE_COLUMN)?;
    let hrr = parse_field(record, hrr_idx, HRR_COLUMN)?;
    Ok(Sample { temperature_c, hrr })
}

fn parse_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing value: `{name}`"))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{raw}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite `{name}` value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# Sample: PET
# Operator: lab
# Date: 2023-02-15
# Mass: 5.1 mg
# Heating Rate: 0.1667 K/s
# Gas: N2
# Flow: 80 mL/min
# Instrument: MCC
# Comment: none
# ---
Time (s)\tTemperature (C)\tHRR (W/g)
0\t20\t0
120\t40\t1
240\t60\t5
oops\tbad\trow
360\t80\t3
480\t100\t0.5
";

    #[test]
    fn parses_header_heating_rate_and_rows() {
        let data = parse_experiment(SAMPLE.as_bytes()).unwrap();
        assert_eq!(data.header.len(), 10);
        assert_eq!(data.header[0], "Sample: PET");
        assert_eq!(data.heating_rate, Some(0.1667));
        assert_eq!(data.columns, vec!["Time (s)", "Temperature (C)", "HRR (W/g)"]);

        assert_eq!(data.rows_read, 6);
        assert_eq!(data.rows_used, 5);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 15);

        assert_eq!(data.series.temperatures_c(), vec![20.0, 40.0, 60.0, 80.0, 100.0]);
        assert_eq!(data.series.hrr(), vec![0.0, 1.0, 5.0, 3.0, 0.5]);
    }

    #[test]
    fn display_header_drops_last_two_lines() {
        let data = parse_experiment(SAMPLE.as_bytes()).unwrap();
        let shown = data.display_header();
        assert_eq!(shown.len(), 8);
        assert_eq!(shown.last().map(String::as_str), Some("Instrument: MCC"));
    }

    #[test]
    fn heating_rate_override_and_absence() {
        let text = SAMPLE.replace("# Heating Rate: 0.1667 K/s", "# Heating: unknown");
        let data = parse_experiment(text.as_bytes()).unwrap();
        assert_eq!(data.heating_rate, None);
        assert_eq!(data.resolve_heating_rate(None).unwrap_err().exit_code(), 2);
        assert_eq!(data.resolve_heating_rate(Some(0.5)).unwrap(), 0.5);
    }

    #[test]
    fn schema_errors_use_exit_codes() {
        let missing = SAMPLE.replace("HRR (W/g)", "Power (W)");
        assert_eq!(parse_experiment(missing.as_bytes()).unwrap_err().exit_code(), 2);

        let short = "# only\n# two lines\n";
        assert_eq!(parse_experiment(short.as_bytes()).unwrap_err().exit_code(), 2);

        let no_rows: String = SAMPLE.lines().take(PREAMBLE_LINES).map(|l| format!("{l}\n")).collect();
        assert_eq!(parse_experiment(no_rows.as_bytes()).unwrap_err().exit_code(), 3);

        let bad_rate = SAMPLE.replace("0.1667 K/s", "fast");
        assert_eq!(parse_experiment(bad_rate.as_bytes()).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let data = load_experiment(file.path()).unwrap();
        assert_eq!(data.source.as_deref(), Some(file.path()));
        assert_eq!(data.series.len(), 5);
        assert!(data.display_name().ends_with(".txt"));
    }
}
