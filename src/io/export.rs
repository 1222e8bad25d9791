//! Export per-year results and generated tables to CSV.
//!
//! Exports are meant to be easy to consume in spreadsheets or downstream
//! scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::YearRow;
use crate::error::ModelError;
use crate::report::YearResidual;

/// Write the per-year observed vs. modeled table to a CSV file.
pub fn write_results_csv(path: &Path, residuals: &[YearResidual]) -> Result<(), ModelError> {
    let mut file = File::create(path).map_err(|e| {
        ModelError::Io(format!(
            "Failed to create export CSV '{}': {e}",
            path.display()
        ))
    })?;

    writeln!(file, "year,t_obs,t_model,residual")
        .map_err(|e| ModelError::Io(format!("Failed to write export CSV header: {e}")))?;
    for r in residuals {
        writeln!(
            file,
            "{},{:.6},{:.6},{:.6}",
            r.year, r.t_obs, r.t_model, r.residual
        )
        .map_err(|e| ModelError::Io(format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}

/// Write a yearly table (for the `sample` subcommand) to a CSV file.
pub fn write_rows_csv(path: &Path, rows: &[YearRow]) -> Result<(), ModelError> {
    let mut file = File::create(path).map_err(|e| {
        ModelError::Io(format!("Failed to create CSV '{}': {e}", path.display()))
    })?;

    writeln!(file, "year,population,total_deaths,suicide_deaths,t_obs")
        .map_err(|e| ModelError::Io(format!("Failed to write CSV header: {e}")))?;
    for r in rows {
        writeln!(
            file,
            "{},{:.0},{:.0},{:.0},{:.0}",
            r.year, r.population, r.total_deaths, r.suicide_deaths, r.t_obs
        )
        .map_err(|e| ModelError::Io(format!("Failed to write CSV row: {e}")))?;
    }
    Ok(())
}
