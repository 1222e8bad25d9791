//! Time integration of the S/T/R system.
//!
//! Classical fixed-substep RK4. Adaptive control is deliberately avoided: the
//! system is smooth and low-dimensional, and fixed stepping makes identical
//! inputs produce bit-identical trajectories, which downstream calibration
//! and golden tests rely on.

use crate::domain::{ParameterSet, State};
use crate::error::ModelError;
use crate::model::exogenous::ExogenousSeries;
use crate::model::ode::derivative;

/// Integration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOptions {
    /// RK4 sub-steps per year of model time (at least 1 per output interval).
    pub steps_per_year: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self { steps_per_year: 64 }
    }
}

/// Integrate from `t_start` to `t_end`, recording one state per requested
/// output time.
///
/// Output times must be finite, ascending, and inside `[t_start, t_end]`.
/// Any non-finite intermediate state aborts with `NumericalInstability`;
/// no partial trajectory is returned.
pub fn simulate(
    params: &ParameterSet,
    exogenous: &ExogenousSeries,
    initial: State,
    t_start: f64,
    t_end: f64,
    output_times: &[f64],
    opts: &SimOptions,
) -> Result<Vec<(f64, State)>, ModelError> {
    if !(t_start.is_finite() && t_end.is_finite()) || t_end < t_start {
        return Err(ModelError::MalformedInput(format!(
            "Invalid time span [{t_start}, {t_end}]."
        )));
    }
    if opts.steps_per_year == 0 {
        return Err(ModelError::MalformedInput(
            "steps_per_year must be >= 1.".to_string(),
        ));
    }
    validate_output_times(output_times, t_start, t_end)?;

    if !initial.is_finite() {
        return Err(ModelError::NumericalInstability { t: t_start });
    }

    let mut t = t_start;
    let mut y = initial;
    let mut out = Vec::with_capacity(output_times.len());

    for &t_out in output_times {
        let span = t_out - t;
        if span > 0.0 {
            let n = ((span * opts.steps_per_year as f64).ceil() as usize).max(1);
            let h = span / n as f64;
            for i in 0..n {
                let t_sub = t + i as f64 * h;
                y = rk4_step(t_sub, h, &y, params, exogenous);
                if !y.is_finite() {
                    return Err(ModelError::NumericalInstability { t: t_sub + h });
                }
            }
            t = t_out;
        }
        out.push((t_out, y));
    }

    Ok(out)
}

fn validate_output_times(output_times: &[f64], t_start: f64, t_end: f64) -> Result<(), ModelError> {
    // Small slack so output times equal to the span endpoints are never
    // rejected for floating-point reasons.
    let tol = 1e-9 * (1.0 + t_end.abs());
    for &t in output_times {
        if !t.is_finite() || t < t_start - tol || t > t_end + tol {
            return Err(ModelError::MalformedInput(format!(
                "Output time {t} outside time span [{t_start}, {t_end}]."
            )));
        }
    }
    for w in output_times.windows(2) {
        if w[1] < w[0] {
            return Err(ModelError::MalformedInput(
                "Output times must be ascending.".to_string(),
            ));
        }
    }
    Ok(())
}

/// One classical RK4 step of size `h` starting at `t`.
fn rk4_step(
    t: f64,
    h: f64,
    y: &State,
    params: &ParameterSet,
    exogenous: &ExogenousSeries,
) -> State {
    let k1 = derivative(t, y, params, exogenous);
    let k2 = derivative(t + 0.5 * h, &offset(y, &k1, 0.5 * h), params, exogenous);
    let k3 = derivative(t + 0.5 * h, &offset(y, &k2, 0.5 * h), params, exogenous);
    let k4 = derivative(t + h, &offset(y, &k3, h), params, exogenous);

    let w = h / 6.0;
    State::new(
        y.susceptible
            + w * (k1.susceptible + 2.0 * k2.susceptible + 2.0 * k3.susceptible + k4.susceptible),
        y.in_treatment
            + w * (k1.in_treatment
                + 2.0 * k2.in_treatment
                + 2.0 * k3.in_treatment
                + k4.in_treatment),
        y.recovered + w * (k1.recovered + 2.0 * k2.recovered + 2.0 * k3.recovered + k4.recovered),
    )
}

fn offset(y: &State, k: &State, h: f64) -> State {
    State::new(
        y.susceptible + h * k.susceptible,
        y.in_treatment + h * k.in_treatment,
        y.recovered + h * k.recovered,
    )
}
