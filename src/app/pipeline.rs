//! Shared fit pipeline used by the `fit` front-end and the debug bundle.
//!
//! Keeping it in one place avoids duplicating the core workflow:
//! ingest -> linear estimation -> calibration -> trajectory -> residuals.

use crate::data::ingest::{load_year_rows, IngestedTable};
use crate::domain::{CalibrationResult, FitMetrics, RunConfig, State};
use crate::error::ModelError;
use crate::fit::calibrate::{calibrate, CalibrateOptions};
use crate::fit::initial::estimate_initial_state;
use crate::fit::linear::{estimate_linear_parameters_detailed, LinearConfig, LinearEstimate};
use crate::model::{simulate, ExogenousSeries, SimOptions};
use crate::report::{compute_metrics, compute_residual_table, YearResidual};

/// All computed outputs of a single `strm fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: IngestedTable,
    pub linear: LinearEstimate,
    pub result: CalibrationResult,
    pub residuals: Vec<YearResidual>,
    pub metrics: FitMetrics,
    /// Dense (year, T_model) samples for plotting.
    pub dense_curve: Vec<(f64, f64)>,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &RunConfig) -> Result<RunOutput, ModelError> {
    let table = load_year_rows(&config.csv_path)?;

    let linear_config = LinearConfig {
        phi: config.phi,
        theta: config.theta,
        rho: config.rho,
        beta: config.beta,
        gamma: config.gamma,
    };
    let linear = estimate_linear_parameters_detailed(&table.rows, &linear_config)?;

    let sim = SimOptions {
        steps_per_year: config.steps_per_year,
    };
    let calibrate_options = CalibrateOptions {
        max_iterations: config.max_iterations,
        grid_steps: config.grid_steps,
        sim,
        ..CalibrateOptions::default()
    };
    let result = calibrate(&table.rows, &linear.params, &calibrate_options, None)?;

    // Final trajectory at the observed years, with the fitted parameters.
    let trajectory = integrate_at(&table, &result, &observed_times(&table), &sim)?;
    let residuals = compute_residual_table(&table.rows, &trajectory)?;
    let metrics = compute_metrics(&residuals)?;

    let dense_times = dense_time_grid(&table, config.plot_points.max(2));
    let dense_curve = integrate_at(&table, &result, &dense_times, &sim)?
        .into_iter()
        .map(|(t, state)| (t, state.in_treatment))
        .collect();

    Ok(RunOutput {
        table,
        linear,
        result,
        residuals,
        metrics,
        dense_curve,
    })
}

fn observed_times(table: &IngestedTable) -> Vec<f64> {
    table.rows.iter().map(|r| f64::from(r.year)).collect()
}

fn dense_time_grid(table: &IngestedTable, n: usize) -> Vec<f64> {
    let t0 = f64::from(table.stats.year_min);
    let t1 = f64::from(table.stats.year_max);
    (0..n)
        .map(|i| t0 + (t1 - t0) * i as f64 / (n - 1) as f64)
        .collect()
}

fn integrate_at(
    table: &IngestedTable,
    result: &CalibrationResult,
    times: &[f64],
    sim: &SimOptions,
) -> Result<Vec<(f64, State)>, ModelError> {
    let exogenous = ExogenousSeries::from_rows(&table.rows)?;
    let initial = estimate_initial_state(&table.rows, &result.params)?;
    simulate(
        &result.params,
        &exogenous,
        initial,
        exogenous.first_year(),
        exogenous.last_year(),
        times,
        sim,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{generate_sample, SampleConfig};
    use crate::io::export::write_rows_csv;
    use std::path::PathBuf;

    fn config_for(csv_path: PathBuf) -> RunConfig {
        RunConfig {
            csv_path,
            phi: 0.5,
            theta: 0.01,
            rho: 0.1,
            beta: 0.3,
            gamma: 0.7,
            steps_per_year: 16,
            max_iterations: 15,
            grid_steps: 0,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            plot_points: 51,
            export_results: None,
            export_fit: None,
            debug: false,
        }
    }

    #[test]
    fn pipeline_runs_end_to_end_on_sample_data() {
        let rows = generate_sample(&SampleConfig {
            years: 10,
            ..SampleConfig::default()
        })
        .unwrap();
        let path =
            std::env::temp_dir().join(format!("strm-pipeline-{}.csv", std::process::id()));
        write_rows_csv(&path, &rows).unwrap();

        let run = run_fit(&config_for(path.clone()));
        std::fs::remove_file(&path).ok();
        let run = run.unwrap();

        assert_eq!(run.residuals.len(), 10);
        assert_eq!(run.dense_curve.len(), 51);
        assert!(run.result.residual.is_finite());
        assert!(run.metrics.rmse.is_finite());
        // Linear parameters survive calibration untouched.
        assert_eq!(run.result.params.delta, run.linear.params.delta);
    }
}
