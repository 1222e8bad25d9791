//! Reporting utilities: per-year residuals and fit quality metrics.

pub mod format;

use crate::domain::{FitMetrics, State, YearRow};
use crate::error::ModelError;

/// Observed vs. modeled T for one year.
#[derive(Debug, Clone, Copy)]
pub struct YearResidual {
    pub year: i32,
    pub t_obs: f64,
    pub t_model: f64,
    pub residual: f64,
}

/// Pair each observed year with the model trajectory sampled at that year.
///
/// The trajectory must have been produced at exactly the observed years, in
/// order; a length mismatch means the caller wired the pipeline wrong.
pub fn compute_residual_table(
    rows: &[YearRow],
    trajectory: &[(f64, State)],
) -> Result<Vec<YearResidual>, ModelError> {
    if rows.len() != trajectory.len() {
        return Err(ModelError::MalformedInput(format!(
            "Trajectory has {} samples for {} observed years.",
            trajectory.len(),
            rows.len()
        )));
    }
    let mut out = Vec::with_capacity(rows.len());
    for (row, (_, state)) in rows.iter().zip(trajectory) {
        if !state.in_treatment.is_finite() {
            return Err(ModelError::NumericalInstability {
                t: f64::from(row.year),
            });
        }
        out.push(YearResidual {
            year: row.year,
            t_obs: row.t_obs,
            t_model: state.in_treatment,
            residual: row.t_obs - state.in_treatment,
        });
    }
    Ok(out)
}

/// MAE, RMSE, MAPE (percent, skipping T_obs = 0 years) and R².
pub fn compute_metrics(residuals: &[YearResidual]) -> Result<FitMetrics, ModelError> {
    if residuals.is_empty() {
        return Err(ModelError::InsufficientData(
            "No residuals to compute metrics from.".to_string(),
        ));
    }

    let n = residuals.len() as f64;
    let mae = residuals.iter().map(|r| r.residual.abs()).sum::<f64>() / n;
    let rmse = (residuals.iter().map(|r| r.residual * r.residual).sum::<f64>() / n).sqrt();

    let mut mape_sum = 0.0;
    let mut mape_n = 0usize;
    for r in residuals {
        if r.t_obs != 0.0 {
            mape_sum += (r.residual / r.t_obs).abs();
            mape_n += 1;
        }
    }
    let mape = if mape_n > 0 {
        100.0 * mape_sum / mape_n as f64
    } else {
        f64::NAN
    };

    let mean_obs = residuals.iter().map(|r| r.t_obs).sum::<f64>() / n;
    let ss_tot = residuals
        .iter()
        .map(|r| (r.t_obs - mean_obs).powi(2))
        .sum::<f64>();
    let ss_res = residuals.iter().map(|r| r.residual * r.residual).sum::<f64>();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        f64::NAN
    };

    Ok(FitMetrics { mae, rmse, mape, r2 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(year: i32, t_obs: f64, t_model: f64) -> YearResidual {
        YearResidual {
            year,
            t_obs,
            t_model,
            residual: t_obs - t_model,
        }
    }

    #[test]
    fn metrics_on_perfect_fit() {
        let rs = vec![residual(2010, 100.0, 100.0), residual(2011, 200.0, 200.0)];
        let m = compute_metrics(&rs).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn metrics_hand_computed() {
        // Residuals +10 and -10 around observations 100 and 200.
        let rs = vec![residual(2010, 100.0, 90.0), residual(2011, 200.0, 210.0)];
        let m = compute_metrics(&rs).unwrap();
        assert!((m.mae - 10.0).abs() < 1e-12);
        assert!((m.rmse - 10.0).abs() < 1e-12);
        // MAPE = 100 * (0.1 + 0.05) / 2 = 7.5
        assert!((m.mape - 7.5).abs() < 1e-12);
        // ss_tot = 2*50^2 = 5000, ss_res = 200, r2 = 1 - 0.04
        assert!((m.r2 - 0.96).abs() < 1e-12);
    }

    #[test]
    fn mape_skips_zero_observations() {
        let rs = vec![residual(2010, 0.0, 5.0), residual(2011, 100.0, 90.0)];
        let m = compute_metrics(&rs).unwrap();
        assert!((m.mape - 10.0).abs() < 1e-12);
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let rows = vec![YearRow {
            year: 2010,
            population: 1.0e6,
            total_deaths: 1.0e4,
            suicide_deaths: 100.0,
            t_obs: 2000.0,
        }];
        let err = compute_residual_table(&rows, &[]).unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput(_)));
    }
}
