//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initializes logging
//! - reads experiment files and runs the fit
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, HeaderArgs, PlotArgs, SimulateArgs};
use crate::domain::{FitConfig, PhysicalParameters};
use crate::error::AppError;
use crate::io::simulate::SimulationSpec;

pub mod pipeline;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "PYRO_LOG";

/// Entry point for the `pyro` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is fine; every setting has a flag.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The TUI owns the terminal; log lines would tear the screen.
    let to_sink = matches!(cli.command, Command::Tui(_));
    init_tracing(cli.quiet, cli.verbose, to_sink)?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Header(args) => handle_header(args),
        Command::Plot(args) => handle_plot(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Tui(args) => handle_tui(args),
    }
}

fn init_tracing(quiet: bool, verbose: bool, to_sink: bool) -> Result<(), AppError> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if to_sink {
        builder.with_writer(std::io::sink).try_init()
    } else {
        builder.with_writer(std::io::stderr).try_init()
    };
    result.map_err(|e| AppError::new(4, format!("Failed to initialize logging: {e}")))
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.data, run.heating_rate, &run.result)
    );

    if config.top_n > 0 {
        let rows = crate::report::largest_residuals(&run.curve, config.top_n);
        println!("{}", crate::report::format_residual_table(&rows));
    }

    if config.plot {
        let plot = crate::plot::render_ascii_plot(&run.curve, config.plot_width, config.plot_height);
        println!("{plot}");
    }

    Ok(())
}

fn handle_header(args: HeaderArgs) -> Result<(), AppError> {
    let path = match &args.file {
        Some(path) => crate::cli::picker::validate_experiment_path(path)?,
        None => crate::cli::picker::prompt_for_experiment_path()?,
    };
    let data = crate::io::ingest::load_experiment(&path)?;
    print!("{}", crate::report::format_header(&data));
    match data.heating_rate {
        Some(rate) => println!("Heating rate: {rate}"),
        None => println!("Heating rate: (not found)"),
    }
    println!("Rows: {} used / {} read", data.rows_used, data.rows_read);
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::result::read_result_json(&args.result)?;

    println!("{}", crate::report::format_result_file(&file));
    if args.top > 0 {
        let rows = crate::report::largest_residuals(&file.curve, args.top);
        println!("{}", crate::report::format_residual_table(&rows));
    }
    println!(
        "{}",
        crate::plot::render_ascii_plot(&file.curve, args.width, args.height)
    );
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = simulation_spec_from_args(&args);
    let series = crate::io::simulate::simulate_experiment(&spec)?;
    crate::io::simulate::write_experiment_file(&args.output, &series, &spec)?;
    println!(
        "Wrote {} samples to {}",
        series.len(),
        args.output.display()
    );
    Ok(())
}

fn handle_tui(args: FitArgs) -> Result<(), AppError> {
    crate::tui::run(fit_config_from_args(&args))
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        file: args.file.clone(),
        heating_rate: args.heating_rate,
        method: args.method,
        bounds: args.params.bounds(),
        guess: args.params.guess(),
        seed: args.seed,
        top_n: args.top,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_curve: args.export_curve.clone(),
        export_result: args.export_result.clone(),
    }
}

pub fn simulation_spec_from_args(args: &SimulateArgs) -> SimulationSpec {
    SimulationSpec {
        params: PhysicalParameters {
            a: args.a,
            ea: args.ea,
            n: args.n,
            m: args.m,
            alpha_zv: args.alpha_zv,
        }
        .to_internal(),
        delta_q: args.delta_q,
        heating_rate: args.heating_rate,
        t_start_c: args.t_start,
        t_end_c: args.t_end,
        n_points: args.points,
        noise: args.noise,
        seed: args.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitMethod;

    #[test]
    fn no_plot_flag_wins() {
        let cli = Cli::try_parse_from([
            "pyro", "fit", "--no-plot", "--method", "de", "--seed", "3", "--top", "4",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert!(!config.plot);
        assert_eq!(config.method, FitMethod::DifferentialEvolution);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.top_n, 4);
    }

    #[test]
    fn simulate_defaults_match_spec_defaults() {
        let cli = Cli::try_parse_from(["pyro", "simulate", "-o", "out.txt"]).unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let spec = simulation_spec_from_args(&args);
        let defaults = SimulationSpec::default();
        assert_eq!(spec.n_points, defaults.n_points);
        assert_eq!(spec.seed, defaults.seed);
        assert!((spec.params.log_ea - defaults.params.log_ea).abs() < 1e-12);
        assert_eq!(spec.params.a, defaults.params.a);

        let cli = Cli::try_parse_from(["pyro", "simulate", "-o", "out.txt", "--ea", "120000"]).unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let spec = simulation_spec_from_args(&args);
        assert!((spec.params.ea() - 120_000.0).abs() < 1e-6);
    }
}
