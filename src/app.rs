//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads or generates the yearly table
//! - runs linear estimation + calibration
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, DeskArgs, FitArgs, PlotArgs, SampleArgs};
use crate::domain::RunConfig;
use crate::error::ModelError;
use crate::model::SimOptions;

pub mod pipeline;

/// Entry point for the `strm` binary.
pub fn run() -> Result<(), ModelError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Desk(args) => handle_desk(args),
        Command::Sample(args) => handle_sample(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), ModelError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format::format_run_summary(
            &run.table,
            &run.linear,
            &run.result,
            &run.metrics
        )
    );
    println!(
        "{}",
        crate::report::format::format_residual_table(&run.residuals)
    );

    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            &run.residuals,
            &run.dense_curve,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.residuals)?;
    }
    if let Some(path) = &config.export_fit {
        crate::io::fitfile::write_fit_json(
            path,
            &run.table.rows,
            &run.result,
            &run.metrics,
            &run.residuals,
            config.plot_points,
            &SimOptions {
                steps_per_year: config.steps_per_year,
            },
        )?;
    }
    if config.debug {
        let path = crate::debug::write_debug_bundle(&run, &config)?;
        println!("Debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_desk(args: DeskArgs) -> Result<(), ModelError> {
    let table = crate::data::ingest::load_year_rows(&args.csv)?;
    let linear = crate::fit::linear::estimate_linear_parameters_detailed(
        &table.rows,
        &crate::fit::linear::LinearConfig {
            phi: args.phi,
            ..crate::fit::linear::LinearConfig::default()
        },
    )?;
    println!(
        "{}",
        crate::report::format::format_desk_summary(&table, &linear)
    );
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), ModelError> {
    let rows = crate::data::sample::generate_sample(&crate::data::sample::SampleConfig {
        start_year: args.start_year,
        years: args.years,
        seed: args.seed,
        noise: args.noise,
    })?;
    crate::io::export::write_rows_csv(&args.out, &rows)?;
    println!("Wrote {} rows to {}", rows.len(), args.out.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), ModelError> {
    let fit = crate::io::fitfile::read_fit_json(&args.fit)?;
    let plot = crate::plot::render_ascii_plot_from_fit_file(&fit, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn run_config_from_args(args: &FitArgs) -> RunConfig {
    RunConfig {
        csv_path: args.csv.clone(),
        phi: args.phi,
        theta: args.theta,
        rho: args.rho,
        beta: args.beta,
        gamma: args.gamma,
        steps_per_year: args.steps_per_year,
        max_iterations: args.max_iterations,
        grid_steps: args.grid_steps,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        plot_points: args.plot_points,
        export_results: args.export.clone(),
        export_fit: args.export_fit.clone(),
        debug: args.debug,
    }
}
