//! Command-line parsing for the `pyro` reaction-kinetics fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    DEFAULT_A_BOUNDS, DEFAULT_A_GUESS, DEFAULT_ALPHA_ZV_BOUNDS, DEFAULT_ALPHA_ZV_GUESS, DEFAULT_EA_BOUNDS,
    DEFAULT_EA_GUESS, DEFAULT_ORDER_BOUNDS, DEFAULT_ORDER_GUESS, FitMethod, ModelParameters, ParamBounds,
};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "pyro",
    version,
    about = "Reaction-rate model fitting for thermal-analysis experiments"
)]
pub struct Cli {
    /// Log at debug level (overridden by `PYRO_LOG`).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log errors only (overridden by `PYRO_LOG`).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the reaction-rate model to an experiment file, print diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Print the metadata header and columns of an experiment file.
    Header(HeaderArgs),
    /// Plot a previously exported result JSON.
    Plot(PlotArgs),
    /// Write a synthetic experiment file from known parameters.
    Simulate(SimulateArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same fit engine as `pyro fit`, but lets you edit the
    /// method and bounds and refit from a terminal UI.
    Tui(FitArgs),
}

/// Options for fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Experiment file (tab-separated instrument export). Prompts when omitted.
    #[arg(short = 'f', long, env = "PYRO_FILE")]
    pub file: Option<PathBuf>,

    /// Optimization strategy.
    #[arg(short = 'm', long, value_enum, default_value_t = FitMethod::LeastSquares)]
    pub method: FitMethod,

    /// Heating rate; replaces the `Heating Rate:` header value.
    #[arg(long)]
    pub heating_rate: Option<f64>,

    /// Seed for differential evolution (unseeded runs are nondeterministic).
    #[arg(long, env = "PYRO_SEED")]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Show the N largest residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the rendered curve (temperature, observed, fitted) to CSV.
    #[arg(long = "export-curve", value_name = "CSV")]
    pub export_curve: Option<PathBuf>,

    /// Export the fit result (parameters, diagnostics, curve) to JSON.
    #[arg(long = "export-result", value_name = "JSON")]
    pub export_result: Option<PathBuf>,
}

/// Search box and initial guess for the five model parameters.
#[derive(Debug, Args, Clone, Copy)]
pub struct ParamArgs {
    /// Lower bound of the pre-exponential factor A (1/s).
    #[arg(long, default_value_t = DEFAULT_A_BOUNDS.0)]
    pub a_min: f64,
    /// Upper bound of A (1/s).
    #[arg(long, default_value_t = DEFAULT_A_BOUNDS.1)]
    pub a_max: f64,
    /// Initial guess for A (1/s).
    #[arg(long, default_value_t = DEFAULT_A_GUESS)]
    pub a0: f64,

    /// Lower bound of ln(Ea), Ea in J/mol.
    #[arg(long, default_value_t = DEFAULT_EA_BOUNDS.0.ln())]
    pub log_ea_min: f64,
    /// Upper bound of ln(Ea).
    #[arg(long, default_value_t = DEFAULT_EA_BOUNDS.1.ln())]
    pub log_ea_max: f64,
    /// Initial guess for ln(Ea).
    #[arg(long, default_value_t = DEFAULT_EA_GUESS.ln())]
    pub log_ea0: f64,

    /// Lower bound of the reaction order n.
    #[arg(long, default_value_t = DEFAULT_ORDER_BOUNDS.0)]
    pub n_min: f64,
    /// Upper bound of n.
    #[arg(long, default_value_t = DEFAULT_ORDER_BOUNDS.1)]
    pub n_max: f64,
    /// Initial guess for n.
    #[arg(long, default_value_t = DEFAULT_ORDER_GUESS)]
    pub n0: f64,

    /// Lower bound of the autocatalytic exponent m.
    #[arg(long, default_value_t = DEFAULT_ORDER_BOUNDS.0)]
    pub m_min: f64,
    /// Upper bound of m.
    #[arg(long, default_value_t = DEFAULT_ORDER_BOUNDS.1)]
    pub m_max: f64,
    /// Initial guess for m.
    #[arg(long, default_value_t = DEFAULT_ORDER_GUESS)]
    pub m0: f64,

    /// Lower bound of the autocatalytic offset alpha_zv.
    #[arg(long, default_value_t = DEFAULT_ALPHA_ZV_BOUNDS.0)]
    pub alpha_zv_min: f64,
    /// Upper bound of alpha_zv.
    #[arg(long, default_value_t = DEFAULT_ALPHA_ZV_BOUNDS.1)]
    pub alpha_zv_max: f64,
    /// Initial guess for alpha_zv.
    #[arg(long, default_value_t = DEFAULT_ALPHA_ZV_GUESS)]
    pub alpha_zv0: f64,
}

impl ParamArgs {
    pub fn bounds(&self) -> ParamBounds {
        ParamBounds {
            a: (self.a_min, self.a_max),
            log_ea: (self.log_ea_min, self.log_ea_max),
            n: (self.n_min, self.n_max),
            m: (self.m_min, self.m_max),
            alpha_zv: (self.alpha_zv_min, self.alpha_zv_max),
        }
    }

    pub fn guess(&self) -> ModelParameters {
        ModelParameters {
            a: self.a0,
            log_ea: self.log_ea0,
            n: self.n0,
            m: self.m0,
            alpha_zv: self.alpha_zv0,
        }
    }
}

/// Options for showing a file header.
#[derive(Debug, Args)]
pub struct HeaderArgs {
    /// Experiment file. Prompts when omitted.
    #[arg(short = 'f', long, env = "PYRO_FILE")]
    pub file: Option<PathBuf>,
}

/// Options for plotting a saved result.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Result JSON file produced by `pyro fit --export-result`.
    #[arg(long, value_name = "JSON")]
    pub result: PathBuf,

    /// Show the N largest residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for writing a synthetic experiment.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Output file.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Pre-exponential factor A (1/s).
    #[arg(long, default_value_t = 1e10)]
    pub a: f64,

    /// Activation energy (J/mol).
    #[arg(long, default_value_t = 1.5e5)]
    pub ea: f64,

    /// Reaction order n.
    #[arg(long, default_value_t = 1.0)]
    pub n: f64,

    /// Autocatalytic exponent m.
    #[arg(long, default_value_t = 0.0)]
    pub m: f64,

    /// Autocatalytic offset alpha_zv.
    #[arg(long, default_value_t = 0.0)]
    pub alpha_zv: f64,

    /// Total heat released (J/g).
    #[arg(long, default_value_t = 1000.0)]
    pub delta_q: f64,

    /// Heating rate (K/s).
    #[arg(long, default_value_t = 0.1667)]
    pub heating_rate: f64,

    /// First temperature (°C).
    #[arg(long, default_value_t = 100.0)]
    pub t_start: f64,

    /// Last temperature (°C).
    #[arg(long, default_value_t = 600.0)]
    pub t_end: f64,

    /// Number of samples.
    #[arg(long, default_value_t = 501)]
    pub points: usize,

    /// Standard deviation of Gaussian HRR noise (W/g).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Noise seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn fit_defaults_match_domain_defaults() {
        let cli = parse(&["pyro", "fit", "-f", "run.txt"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.method, FitMethod::LeastSquares);
        assert_eq!(args.params.bounds(), ParamBounds::default());
        assert_eq!(args.params.guess(), ModelParameters::default());
        assert!(args.plot && !args.no_plot);
    }

    #[test]
    fn method_names_and_aliases_parse() {
        for (raw, expected) in [
            ("minimize", FitMethod::Minimize),
            ("least squares", FitMethod::LeastSquares),
            ("ls", FitMethod::LeastSquares),
            ("differential evolution", FitMethod::DifferentialEvolution),
            ("de", FitMethod::DifferentialEvolution),
        ] {
            let cli = parse(&["pyro", "fit", "--method", raw]);
            let Command::Fit(args) = cli.command else {
                panic!("expected fit");
            };
            assert_eq!(args.method, expected, "{raw}");
        }
        assert!(Cli::try_parse_from(["pyro", "fit", "--method", "newton"]).is_err());
    }

    #[test]
    fn parameter_flags_override_box() {
        let cli = parse(&["pyro", "-q", "tui", "--n-min", "0.5", "--n-max", "2", "--alpha-zv0", "0"]);
        assert!(cli.quiet);
        let Command::Tui(args) = cli.command else {
            panic!("expected tui");
        };
        let bounds = args.params.bounds();
        assert_eq!(bounds.n, (0.5, 2.0));
        assert_eq!(args.params.guess().alpha_zv, 0.0);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["pyro", "-v", "-q", "header"]).is_err());
    }
}
