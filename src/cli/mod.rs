//! Command-line parsing for the S/T/R model fitter.
//!
//! Argument parsing and command dispatch stay separate from the modeling and
//! math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "strm", version, about = "Three-compartment S/T/R population model fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate linear parameters, calibrate [theta, rho, beta, gamma], and report.
    Fit(FitArgs),
    /// Print the linear parameter estimates only (no calibration).
    Desk(DeskArgs),
    /// Generate a synthetic yearly table CSV.
    Sample(SampleArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
}

/// Options for the full fit pipeline.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Input CSV (year, population, total_deaths, suicide_deaths, t_obs).
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// phi: proportion of the treated compartment transitioning to R.
    #[arg(long, default_value_t = 0.5)]
    pub phi: f64,

    /// Seed value for theta (inflow rate).
    #[arg(long, default_value_t = 0.01)]
    pub theta: f64,

    /// Seed value for rho (recovery rate).
    #[arg(long, default_value_t = 0.1)]
    pub rho: f64,

    /// Seed value for beta (contagion share, within [0, 1]).
    #[arg(long, default_value_t = 0.3)]
    pub beta: f64,

    /// Seed value for gamma (non-contagion inflow factor).
    #[arg(long, default_value_t = 0.7)]
    pub gamma: f64,

    /// RK4 sub-steps per year of model time.
    #[arg(long, default_value_t = 64)]
    pub steps_per_year: usize,

    /// Optimizer iteration budget.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Prescreen grid points per free parameter (0 disables the prescreen).
    #[arg(long, default_value_t = 4)]
    pub grid_steps: usize,

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

    /// Dense trajectory points for plotting and fit export.
    #[arg(long, default_value_t = 101)]
    pub plot_points: usize,

    /// Export per-year results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the calibrated model (params + metrics + grid) to JSON.
    #[arg(long = "export-fit")]
    pub export_fit: Option<PathBuf>,

    /// Write a markdown debug bundle under ./debug/.
    #[arg(long)]
    pub debug: bool,
}

/// Options for the linear-estimates-only view.
#[derive(Debug, Parser)]
pub struct DeskArgs {
    /// Input CSV (year, population, total_deaths, suicide_deaths, t_obs).
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// phi: proportion of the treated compartment transitioning to R.
    #[arg(long, default_value_t = 0.5)]
    pub phi: f64,
}

/// Options for synthetic table generation.
#[derive(Debug, Parser)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(value_name = "CSV")]
    pub out: PathBuf,

    /// First year of the table.
    #[arg(long, default_value_t = 2000)]
    pub start_year: i32,

    /// Number of years to generate.
    #[arg(long, default_value_t = 21)]
    pub years: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Log-scale noise standard deviation (0 = exact trend).
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,
}

/// Options for plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `strm fit --export-fit`.
    #[arg(value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
