//! Read/write fit JSON files.
//!
//! A fit file is the portable representation of a calibrated model:
//! parameters, fit quality, the observed series, and a precomputed dense
//! trajectory so a later `plot` invocation never has to re-integrate.
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{CalibrationResult, FitFile, FitMetrics, TrajectoryGrid, YearRow};
use crate::error::ModelError;
use crate::fit::initial::estimate_initial_state;
use crate::model::{simulate, ExogenousSeries, SimOptions};
use crate::report::YearResidual;

/// Write a fit JSON file, including a freshly integrated dense grid.
pub fn write_fit_json(
    path: &Path,
    rows: &[YearRow],
    result: &CalibrationResult,
    metrics: &FitMetrics,
    residuals: &[YearResidual],
    grid_points: usize,
    sim: &SimOptions,
) -> Result<(), ModelError> {
    let grid = build_grid(rows, result, grid_points, sim)?;

    let fit = FitFile {
        tool: "strm".to_string(),
        generated: chrono::Utc::now().to_rfc3339(),
        params: result.params,
        residual: result.residual,
        converged: result.converged,
        metrics: *metrics,
        years: residuals.iter().map(|r| r.year).collect(),
        t_obs: residuals.iter().map(|r| r.t_obs).collect(),
        t_model: residuals.iter().map(|r| r.t_model).collect(),
        grid,
    };

    let file = File::create(path).map_err(|e| {
        ModelError::Io(format!("Failed to create fit JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, &fit)
        .map_err(|e| ModelError::Io(format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, ModelError> {
    let file = File::open(path).map_err(|e| {
        ModelError::Io(format!("Failed to open fit JSON '{}': {e}", path.display()))
    })?;
    let fit: FitFile = serde_json::from_reader(file)
        .map_err(|e| ModelError::MalformedInput(format!("Invalid fit JSON: {e}")))?;
    Ok(fit)
}

fn build_grid(
    rows: &[YearRow],
    result: &CalibrationResult,
    grid_points: usize,
    sim: &SimOptions,
) -> Result<TrajectoryGrid, ModelError> {
    let n = grid_points.max(2);
    let exogenous = ExogenousSeries::from_rows(rows)?;
    let initial = estimate_initial_state(rows, &result.params)?;

    let t0 = exogenous.first_year();
    let t1 = exogenous.last_year();
    let times: Vec<f64> = (0..n)
        .map(|i| t0 + (t1 - t0) * i as f64 / (n - 1) as f64)
        .collect();

    let samples = simulate(&result.params, &exogenous, initial, t0, t1, &times, sim)?;
    Ok(TrajectoryGrid::from_samples(&samples))
}
