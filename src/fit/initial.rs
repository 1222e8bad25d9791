//! Initial compartment state from the first observed year.
//!
//! - T₀ is the observed in-treatment count of the first row
//! - R₀ = ρ·T₀ (the recovered stock implied by the recovery rate)
//! - S₀ = P₀ − T₀ − R₀
//!
//! A negative S₀ is not clamped: it means the observed counts and ρ are
//! mutually inconsistent and the caller has to see that.

use crate::domain::{ParameterSet, State, YearRow};
use crate::error::ModelError;

/// Compute (S₀, T₀, R₀) from the first row of the table.
pub fn estimate_initial_state(
    rows: &[YearRow],
    params: &ParameterSet,
) -> Result<State, ModelError> {
    let first = rows.first().ok_or_else(|| {
        ModelError::InsufficientData(
            "At least one row is required for the initial state.".to_string(),
        )
    })?;

    let t0 = first.t_obs;
    let r0 = params.rho * t0;
    let s0 = first.population - t0 - r0;

    if s0 < 0.0 {
        return Err(ModelError::InconsistentState { s0 });
    }

    Ok(State::new(s0, t0, r0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_rho(rho: f64) -> ParameterSet {
        ParameterSet {
            delta: 0.01,
            delta_s: 0.0001,
            delta_n: 0.0099,
            m: 0.002,
            phi: 0.5,
            psi: 0.997,
            theta: 0.01,
            rho,
            beta: 0.3,
            gamma: 0.7,
        }
    }

    fn rows() -> Vec<YearRow> {
        vec![YearRow {
            year: 2010,
            population: 1_000_000.0,
            total_deaths: 10_000.0,
            suicide_deaths: 100.0,
            t_obs: 2_000.0,
        }]
    }

    #[test]
    fn zero_rho_gives_empty_recovered_stock() {
        let s = estimate_initial_state(&rows(), &params_with_rho(0.0)).unwrap();
        assert_eq!(s.in_treatment, 2_000.0);
        assert_eq!(s.recovered, 0.0);
        assert_eq!(s.susceptible, 998_000.0);
    }

    #[test]
    fn recovered_stock_scales_with_rho() {
        let s = estimate_initial_state(&rows(), &params_with_rho(0.1)).unwrap();
        assert_eq!(s.in_treatment, 2_000.0);
        assert_eq!(s.recovered, 200.0);
        assert_eq!(s.susceptible, 997_800.0);
    }

    #[test]
    fn negative_susceptible_is_inconsistent_state() {
        let rows = vec![YearRow {
            year: 2010,
            population: 1_000.0,
            total_deaths: 10.0,
            suicide_deaths: 1.0,
            t_obs: 900.0,
        }];
        // T0 + R0 = 900 + 450 > 1000.
        let err = estimate_initial_state(&rows, &params_with_rho(0.5)).unwrap_err();
        assert!(matches!(err, ModelError::InconsistentState { .. }));
    }

    #[test]
    fn empty_table_is_insufficient_data() {
        let err = estimate_initial_state(&[], &params_with_rho(0.1)).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData(_)));
    }
}
