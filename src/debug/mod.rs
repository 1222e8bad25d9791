//! Debug bundle writer for inspecting a full fit run.
//!
//! Writes a timestamped markdown file under ./debug/ with the dataset stats,
//! linear parameters, calibration outcome, and the per-year residual table.

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use crate::app::pipeline::RunOutput;
use crate::domain::RunConfig;
use crate::error::ModelError;

pub fn write_debug_bundle(run: &RunOutput, config: &RunConfig) -> Result<PathBuf, ModelError> {
    let dir = PathBuf::from("debug");
    create_dir_all(&dir)
        .map_err(|e| ModelError::Io(format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("strm_debug_{ts}.md"));
    let mut file = File::create(&path)
        .map_err(|e| ModelError::Io(format!("Failed to create debug file: {e}")))?;

    write_bundle(&mut file, run, config)
        .map_err(|e| ModelError::Io(format!("Failed to write debug bundle: {e}")))?;
    Ok(path)
}

fn write_bundle(file: &mut File, run: &RunOutput, config: &RunConfig) -> std::io::Result<()> {
    writeln!(file, "# strm debug bundle")?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(file, "- input: {}", config.csv_path.display())?;
    writeln!(
        file,
        "- rows: {} (years {}..{})",
        run.table.stats.n_rows, run.table.stats.year_min, run.table.stats.year_max
    )?;
    writeln!(
        file,
        "- settings: phi={}, steps_per_year={}, max_iterations={}, grid_steps={}",
        config.phi, config.steps_per_year, config.max_iterations, config.grid_steps
    )?;

    if !run.table.row_errors.is_empty() {
        writeln!(file, "\n## Ingest row errors")?;
        for e in &run.table.row_errors {
            writeln!(file, "- line {}: {}", e.line, e.message)?;
        }
    }

    writeln!(file, "\n## Linear parameters")?;
    writeln!(file, "| param | value |")?;
    writeln!(file, "| - | - |")?;
    let p = &run.linear.params;
    writeln!(file, "| delta | {:.6e} |", p.delta)?;
    writeln!(file, "| delta_s | {:.6e} |", p.delta_s)?;
    writeln!(file, "| delta_n | {:.6e} |", p.delta_n)?;
    writeln!(file, "| m | {:.6e} |", p.m)?;
    writeln!(file, "| phi | {:.4} |", p.phi)?;
    writeln!(file, "| psi | {:.6} |", p.psi)?;

    writeln!(file, "\n## Calibration")?;
    writeln!(
        file,
        "- converged: {} ({} iterations, {} evaluations)",
        run.result.converged, run.result.iterations, run.result.evaluations
    )?;
    writeln!(file, "- SSE: {:.6}", run.result.residual)?;
    writeln!(file, "| param | seed | fitted |")?;
    writeln!(file, "| - | - | - |")?;
    let names = ["theta", "rho", "beta", "gamma"];
    for ((name, seed), fitted) in names
        .into_iter()
        .zip(run.linear.params.free())
        .zip(run.result.params.free())
    {
        writeln!(file, "| {name} | {seed:.6} | {fitted:.6} |")?;
    }

    writeln!(file, "\n## Fit quality")?;
    writeln!(
        file,
        "- MAE={:.4}, RMSE={:.4}, MAPE={:.2}%, R2={:.6}",
        run.metrics.mae, run.metrics.rmse, run.metrics.mape, run.metrics.r2
    )?;

    writeln!(file, "\n## Per-year residuals")?;
    writeln!(file, "| year | t_obs | t_model | residual |")?;
    writeln!(file, "| - | - | - | - |")?;
    for r in &run.residuals {
        writeln!(
            file,
            "| {} | {:.2} | {:.2} | {:.2} |",
            r.year, r.t_obs, r.t_model, r.residual
        )?;
    }

    Ok(())
}
