//! Right-hand side of the S/T/R system.
//!
//! ```text
//! dS/dt = θP(t) + (1−δₙ)R − γ(1−β)δₛS − βδₛ(T/P)S − δₛS − δₙS
//! dT/dt = γ(1−β)δₛS + βδₛ(T/P)S − ρT − δₛT − δₙT
//! dR/dt = ρT − R
//! ```
//!
//! The T/P ratio in the contagion term is the sole singularity risk: when
//! P(t) is at or below `P_EPSILON` the contagion term is defined as zero
//! instead of being evaluated, so no infinity ever enters the integrator.
//! This substitution is a policy branch, not an error path, and it is the
//! only place the equations deviate from their literal form.

use crate::domain::{ParameterSet, State};
use crate::model::exogenous::ExogenousSeries;

/// Threshold below which the contagion term βδₛ(T/P)S is taken as zero.
pub const P_EPSILON: f64 = 1e-6;

/// Evaluate the state derivative at time `t`.
///
/// Pure function: no side effects, no mutable captured state, so the
/// integrator may re-evaluate it at arbitrary (t, state) pairs.
pub fn derivative(
    t: f64,
    state: &State,
    params: &ParameterSet,
    exogenous: &ExogenousSeries,
) -> State {
    let p = exogenous.lookup(t);
    let (s, tr, r) = (state.susceptible, state.in_treatment, state.recovered);

    // Treatment inflow splits into a non-contagion channel and a contagion
    // channel proportional to the treated share T/P.
    let inflow_direct = params.gamma * (1.0 - params.beta) * params.delta_s * s;
    let inflow_contagion = if p <= P_EPSILON {
        0.0
    } else {
        params.beta * params.delta_s * (tr / p) * s
    };

    let ds = params.theta * p + (1.0 - params.delta_n) * r
        - inflow_direct
        - inflow_contagion
        - params.delta_s * s
        - params.delta_n * s;

    let dt = inflow_direct + inflow_contagion
        - params.rho * tr
        - params.delta_s * tr
        - params.delta_n * tr;

    let dr = params.rho * tr - r;

    State::new(ds, dt, dr)
}
