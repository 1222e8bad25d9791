//! Formatted terminal output.
//!
//! Formatting lives in one place so the estimation code stays clean and
//! output changes are localized.

use crate::data::ingest::IngestedTable;
use crate::domain::{CalibrationResult, FitMetrics, ParameterSet};
use crate::fit::linear::LinearEstimate;
use crate::report::YearResidual;

/// Full run summary: dataset stats, linear parameters, calibration outcome.
pub fn format_run_summary(
    table: &IngestedTable,
    linear: &LinearEstimate,
    result: &CalibrationResult,
    metrics: &FitMetrics,
) -> String {
    let mut out = String::new();

    out.push_str("=== strm - S/T/R population model fit ===\n");
    out.push_str(&format!(
        "Data: {} rows | years [{}, {}] | P=[{:.0}, {:.0}]\n",
        table.stats.n_rows,
        table.stats.year_min,
        table.stats.year_max,
        table.stats.population_min,
        table.stats.population_max
    ));
    if !table.row_errors.is_empty() {
        out.push_str(&format!(
            "Skipped {} invalid row(s) during ingest.\n",
            table.row_errors.len()
        ));
    }
    if !linear.excluded_years.is_empty() {
        out.push_str(&format!(
            "Excluded years (P <= 0): {}\n",
            fmt_years(&linear.excluded_years)
        ));
    }
    if !linear.zero_treatment_years.is_empty() {
        out.push_str(&format!(
            "Years without treatment data (skipped for m): {}\n",
            fmt_years(&linear.zero_treatment_years)
        ));
    }

    out.push_str("\nLinear parameters:\n");
    let p = &linear.params;
    out.push_str(&format!("- delta   = {:.6e}\n", p.delta));
    out.push_str(&format!("- delta_s = {:.6e}\n", p.delta_s));
    out.push_str(&format!("- delta_n = {:.6e}\n", p.delta_n));
    out.push_str(&format!("- m       = {:.6e}\n", p.m));
    out.push_str(&format!("- phi     = {:.4}\n", p.phi));
    out.push_str(&format!("- psi     = {:.6}\n", p.psi));

    out.push_str("\nCalibration:\n");
    out.push_str(&format!(
        "- status: {} ({} iterations, {} objective evaluations)\n",
        if result.converged {
            "converged"
        } else {
            "not converged"
        },
        result.iterations,
        result.evaluations
    ));
    out.push_str(&format!("- SSE: {:.6}\n", result.residual));
    out.push_str(&format_parameter_comparison(&linear.params, &result.params));

    out.push_str("\nFit quality (T_model vs T_obs):\n");
    out.push_str(&format!("- MAE : {:.4}\n", metrics.mae));
    out.push_str(&format!("- RMSE: {:.4}\n", metrics.rmse));
    out.push_str(&format!("- MAPE: {:.2}%\n", metrics.mape));
    out.push_str(&format!("- R2  : {:.6}\n", metrics.r2));

    out
}

/// Seed vs. fitted free parameters, one line each.
pub fn format_parameter_comparison(seed: &ParameterSet, fitted: &ParameterSet) -> String {
    let mut out = String::new();
    let names = ["theta", "rho", "beta", "gamma"];
    for ((name, s), f) in names.into_iter().zip(seed.free()).zip(fitted.free()) {
        out.push_str(&format!("- {name:<5} seed={s:.6} -> fitted={f:.6}\n"));
    }
    out
}

/// Per-year observed vs. modeled table.
pub fn format_residual_table(residuals: &[YearResidual]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6} {:>14} {:>14} {:>14}\n",
        "year", "t_obs", "t_model", "residual"
    ));
    out.push_str(&format!("{:-<6} {:-<14} {:-<14} {:-<14}\n", "", "", "", ""));
    for r in residuals {
        out.push_str(&format!(
            "{:<6} {:>14.2} {:>14.2} {:>14.2}\n",
            r.year, r.t_obs, r.t_model, r.residual
        ));
    }
    out
}

/// The `desk` view: linear parameters only, no calibration.
pub fn format_desk_summary(table: &IngestedTable, linear: &LinearEstimate) -> String {
    let mut out = String::new();
    out.push_str("=== strm - linear parameter estimates ===\n");
    out.push_str(&format!(
        "Data: {} rows | years [{}, {}]\n",
        table.stats.n_rows, table.stats.year_min, table.stats.year_max
    ));
    let p = &linear.params;
    out.push_str(&format!(
        "{:<8} {:>14}\n{:-<8} {:-<14}\n",
        "param", "value", "", ""
    ));
    out.push_str(&format!("{:<8} {:>14.6e}\n", "delta", p.delta));
    out.push_str(&format!("{:<8} {:>14.6e}\n", "delta_s", p.delta_s));
    out.push_str(&format!("{:<8} {:>14.6e}\n", "delta_n", p.delta_n));
    out.push_str(&format!("{:<8} {:>14.6e}\n", "m", p.m));
    out.push_str(&format!("{:<8} {:>14.6}\n", "phi", p.phi));
    out.push_str(&format!("{:<8} {:>14.6}\n", "psi", p.psi));
    out
}

fn fmt_years(years: &[i32]) -> String {
    let parts: Vec<String> = years.iter().map(|y| y.to_string()).collect();
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet {
            delta: 0.01,
            delta_s: 0.0001,
            delta_n: 0.0099,
            m: 0.002,
            phi: 0.5,
            psi: 0.997,
            theta: 0.01,
            rho: 0.1,
            beta: 0.3,
            gamma: 0.7,
        }
    }

    #[test]
    fn comparison_lists_all_free_parameters() {
        let seed = params();
        let fitted = seed.with_free([0.02, 0.2, 0.4, 0.8]);
        let text = format_parameter_comparison(&seed, &fitted);
        for name in ["theta", "rho", "beta", "gamma"] {
            assert!(text.contains(name), "missing {name} in:\n{text}");
        }
        assert!(text.contains("0.020000"));
    }

    #[test]
    fn residual_table_has_one_line_per_year() {
        let rs = vec![
            YearResidual {
                year: 2010,
                t_obs: 2000.0,
                t_model: 1990.0,
                residual: 10.0,
            },
            YearResidual {
                year: 2011,
                t_obs: 2100.0,
                t_model: 2105.0,
                residual: -5.0,
            },
        ];
        let text = format_residual_table(&rs);
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("2010"));
        assert!(text.contains("2011"));
    }
}
