//! Closed-form linear parameter estimation.
//!
//! All of these are direct functions of the yearly table, computed once per
//! run before any ODE work:
//!
//! - δ  = arithmetic mean of total_deaths / P
//! - δₛ = arithmetic mean of suicide_deaths / P
//! - δₙ = δ − δₛ
//! - m  = geometric mean of T_obs / P (rows with T_obs > 0 only)
//! - ψ  = 1 − m − φ·m, with φ an explicit input
//!
//! Rows with P ≤ 0 cannot contribute to any ratio and are excluded from every
//! mean; the detailed variant reports which years were dropped.

use crate::domain::{ParameterSet, YearRow};
use crate::error::ModelError;

/// Inputs the linear estimator cannot derive from the table: φ and the seed
/// values for the free parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearConfig {
    /// φ: proportion of the treated compartment that transitions to R.
    pub phi: f64,
    pub theta: f64,
    pub rho: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            phi: 0.5,
            theta: 0.01,
            rho: 0.1,
            beta: 0.3,
            gamma: 0.7,
        }
    }
}

/// Linear estimate plus the bookkeeping a report wants.
#[derive(Debug, Clone)]
pub struct LinearEstimate {
    pub params: ParameterSet,
    /// Years excluded from all means because P ≤ 0.
    pub excluded_years: Vec<i32>,
    /// Usable rows that still had T_obs ≤ 0 and were skipped for m only.
    pub zero_treatment_years: Vec<i32>,
}

/// Estimate the linear parameters from the yearly table.
pub fn estimate_linear_parameters(
    rows: &[YearRow],
    config: &LinearConfig,
) -> Result<ParameterSet, ModelError> {
    estimate_linear_parameters_detailed(rows, config).map(|e| e.params)
}

/// Like [`estimate_linear_parameters`] but also reports excluded rows.
pub fn estimate_linear_parameters_detailed(
    rows: &[YearRow],
    config: &LinearConfig,
) -> Result<LinearEstimate, ModelError> {
    if !(0.0..=1.0).contains(&config.phi) || !config.phi.is_finite() {
        return Err(ModelError::InvalidRange {
            name: "phi",
            value: config.phi,
        });
    }

    let mut excluded_years = Vec::new();
    let mut zero_treatment_years = Vec::new();

    let mut n_usable = 0usize;
    let mut sum_delta = 0.0;
    let mut sum_delta_s = 0.0;
    let mut n_m = 0usize;
    let mut sum_log_ratio = 0.0;

    for row in rows {
        if row.population <= 0.0 {
            excluded_years.push(row.year);
            continue;
        }
        n_usable += 1;
        sum_delta += row.total_deaths / row.population;
        sum_delta_s += row.suicide_deaths / row.population;

        if row.t_obs > 0.0 {
            n_m += 1;
            sum_log_ratio += (row.t_obs / row.population).ln();
        } else {
            zero_treatment_years.push(row.year);
        }
    }

    if n_usable == 0 {
        return Err(ModelError::InsufficientData(
            "No rows with P > 0; cannot estimate death rates.".to_string(),
        ));
    }
    if n_m == 0 {
        return Err(ModelError::InsufficientData(
            "No rows with T_obs > 0; cannot estimate the treatment rate m.".to_string(),
        ));
    }

    let delta = sum_delta / n_usable as f64;
    let delta_s = sum_delta_s / n_usable as f64;
    let delta_n = delta - delta_s;
    let m = (sum_log_ratio / n_m as f64).exp();
    let psi = 1.0 - m - config.phi * m;

    // Rates are ratios of counts, so they must land in [0, 1] up to floating
    // point noise. Anything else means the table is not what it claims to be.
    check_unit_range("delta", delta)?;
    check_unit_range("delta_s", delta_s)?;
    check_unit_range("delta_n", delta_n)?;
    check_unit_range("m", m)?;
    check_unit_range("psi", psi)?;

    Ok(LinearEstimate {
        params: ParameterSet {
            delta,
            delta_s,
            delta_n,
            m,
            phi: config.phi,
            psi,
            theta: config.theta,
            rho: config.rho,
            beta: config.beta,
            gamma: config.gamma,
        },
        excluded_years,
        zero_treatment_years,
    })
}

const UNIT_RANGE_TOL: f64 = 1e-9;

fn check_unit_range(name: &'static str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() || value < -UNIT_RANGE_TOL || value > 1.0 + UNIT_RANGE_TOL {
        return Err(ModelError::InvalidRange { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: i32, population: f64, total: f64, suicide: f64, t_obs: f64) -> YearRow {
        YearRow {
            year,
            population,
            total_deaths: total,
            suicide_deaths: suicide,
            t_obs,
        }
    }

    #[test]
    fn estimates_match_hand_computed_means() {
        // Every row identical, so means equal the per-row ratios exactly.
        let rows: Vec<YearRow> = (2010..2015)
            .map(|y| row(y, 1_000_000.0, 10_000.0, 100.0, 2_000.0))
            .collect();

        let p = estimate_linear_parameters(&rows, &LinearConfig::default()).unwrap();
        assert!((p.delta - 0.01).abs() < 1e-12);
        assert!((p.delta_s - 0.0001).abs() < 1e-12);
        assert!((p.delta_n - 0.0099).abs() < 1e-12);
        assert!((p.m - 0.002).abs() < 1e-12);
        assert!((p.psi - (1.0 - 0.002 - 0.5 * 0.002)).abs() < 1e-12);
        assert_eq!(p.phi, 0.5);
    }

    #[test]
    fn geometric_mean_over_varying_ratios() {
        let rows = vec![
            row(2010, 1_000_000.0, 10_000.0, 100.0, 1_000.0),
            row(2011, 1_000_000.0, 10_000.0, 100.0, 4_000.0),
        ];
        let p = estimate_linear_parameters(&rows, &LinearConfig::default()).unwrap();
        // Geometric mean of 1e-3 and 4e-3 is 2e-3.
        assert!((p.m - 0.002).abs() < 1e-12);
    }

    #[test]
    fn rows_with_nonpositive_population_are_excluded() {
        let rows = vec![
            row(2010, 1_000_000.0, 10_000.0, 100.0, 2_000.0),
            row(2011, 0.0, 999.0, 999.0, 999.0),
            row(2012, 1_000_000.0, 10_000.0, 100.0, 2_000.0),
        ];
        let est =
            estimate_linear_parameters_detailed(&rows, &LinearConfig::default()).unwrap();
        assert_eq!(est.excluded_years, vec![2011]);
        assert!((est.params.delta - 0.01).abs() < 1e-12);
    }

    #[test]
    fn zero_treatment_rows_skip_m_but_keep_death_rates() {
        let rows = vec![
            row(2010, 1_000_000.0, 10_000.0, 100.0, 2_000.0),
            row(2011, 1_000_000.0, 10_000.0, 100.0, 0.0),
        ];
        let est =
            estimate_linear_parameters_detailed(&rows, &LinearConfig::default()).unwrap();
        assert_eq!(est.zero_treatment_years, vec![2011]);
        // m comes from the single positive row.
        assert!((est.params.m - 0.002).abs() < 1e-12);
        // Death rates still average both rows.
        assert!((est.params.delta - 0.01).abs() < 1e-12);
    }

    #[test]
    fn all_rows_unusable_is_insufficient_data() {
        let rows = vec![row(2010, 0.0, 1.0, 1.0, 1.0)];
        let err = estimate_linear_parameters(&rows, &LinearConfig::default()).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData(_)));
    }

    #[test]
    fn suicide_exceeding_total_deaths_trips_range_check() {
        // δₙ = δ − δₛ would go negative.
        let rows = vec![row(2010, 1_000_000.0, 100.0, 10_000.0, 2_000.0)];
        let err = estimate_linear_parameters(&rows, &LinearConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidRange { name: "delta_n", .. }
        ));
    }

    #[test]
    fn phi_outside_unit_interval_is_rejected() {
        let rows = vec![row(2010, 1_000_000.0, 10_000.0, 100.0, 2_000.0)];
        let cfg = LinearConfig {
            phi: 1.5,
            ..LinearConfig::default()
        };
        let err = estimate_linear_parameters(&rows, &cfg).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { name: "phi", .. }));
    }
}
