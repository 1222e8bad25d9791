//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during estimation and calibration
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One row of the observed yearly table.
///
/// The loader guarantees rows are sorted by ascending year with no duplicates
/// before they reach the estimators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearRow {
    pub year: i32,
    /// Vulnerable population P for that year (> 0 expected).
    pub population: f64,
    pub total_deaths: f64,
    pub suicide_deaths: f64,
    /// Observed in-treatment count T.
    pub t_obs: f64,
}

/// Immutable snapshot of all model constants and free parameters.
///
/// Linear parameters (fixed by the linear estimator, never touched by the
/// calibrator):
///
/// - `delta` (δ): mean total death rate
/// - `delta_s` (δₛ): mean suicide death rate
/// - `delta_n` (δₙ): mean non-suicide death rate, δₙ = δ − δₛ
/// - `m`: global treatment rate (geometric mean of T/P)
/// - `phi` (φ): proportion of T that transitions to R (explicit input)
/// - `psi` (ψ): proportion of P in S, ψ = 1 − m − φ·m
///
/// Free parameters (the only fields the calibrator mutates, by producing a new
/// snapshot):
///
/// - `theta` (θ): inflow rate from the vulnerable population into S
/// - `rho` (ρ): recovery rate T → R
/// - `beta` (β): contagion share of the treatment inflow, β ∈ [0, 1]
/// - `gamma` (γ): proportionality factor of the non-contagion inflow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub delta: f64,
    pub delta_s: f64,
    pub delta_n: f64,
    pub m: f64,
    pub phi: f64,
    pub psi: f64,
    pub theta: f64,
    pub rho: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl ParameterSet {
    /// Free parameters in calibration order: [θ, ρ, β, γ].
    pub fn free(&self) -> [f64; 4] {
        [self.theta, self.rho, self.beta, self.gamma]
    }

    /// New snapshot with the free parameters replaced; linear parameters are
    /// carried over untouched.
    pub fn with_free(&self, free: [f64; 4]) -> Self {
        Self {
            theta: free[0],
            rho: free[1],
            beta: free[2],
            gamma: free[3],
            ..*self
        }
    }
}

/// Compartment state (S, T, R) at a single time.
///
/// Non-negativity is a property of the model construction, not enforced by
/// clamping; the integrator only checks finiteness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub susceptible: f64,
    pub in_treatment: f64,
    pub recovered: f64,
}

impl State {
    pub fn new(susceptible: f64, in_treatment: f64, recovered: f64) -> Self {
        Self {
            susceptible,
            in_treatment,
            recovered,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.susceptible.is_finite() && self.in_treatment.is_finite() && self.recovered.is_finite()
    }
}

/// Inclusive `[lower, upper]` box constraints for the four free parameters.
///
/// Defaults match the model semantics: rates are non-negative and unbounded
/// above, β is a proportion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub theta: (f64, f64),
    pub rho: (f64, f64),
    pub beta: (f64, f64),
    pub gamma: (f64, f64),
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            theta: (0.0, f64::INFINITY),
            rho: (0.0, f64::INFINITY),
            beta: (0.0, 1.0),
            gamma: (0.0, f64::INFINITY),
        }
    }
}

impl ParameterBounds {
    /// Bounds in calibration order: [θ, ρ, β, γ].
    pub fn as_array(&self) -> [(f64, f64); 4] {
        [self.theta, self.rho, self.beta, self.gamma]
    }

    /// Project a free-parameter vector onto the bounds box.
    pub fn clamp(&self, free: [f64; 4]) -> [f64; 4] {
        let b = self.as_array();
        let mut out = free;
        for (v, (lo, hi)) in out.iter_mut().zip(b.iter()) {
            *v = v.clamp(*lo, *hi);
        }
        out
    }
}

/// Outcome of one calibration run. Immutable once returned.
///
/// Non-convergence is a normal, reportable outcome: `converged = false` still
/// carries the best parameter set found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub params: ParameterSet,
    /// Final sum of squared errors against observed T.
    pub residual: f64,
    /// Optimizer iterations actually performed.
    pub iterations: usize,
    /// Objective evaluations (each one is a full ODE solve).
    pub evaluations: usize,
    pub converged: bool,
}

/// Fit quality metrics of T_model against T_obs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute relative error, in percent.
    pub mape: f64,
    pub r2: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub csv_path: PathBuf,

    /// φ: proportion of T that transitions to R (explicit input, see the
    /// linear estimator).
    pub phi: f64,
    /// Seed values for the free parameters before calibration.
    pub theta: f64,
    pub rho: f64,
    pub beta: f64,
    pub gamma: f64,

    /// RK4 sub-steps per year of model time.
    pub steps_per_year: usize,
    /// Optimizer iteration budget.
    pub max_iterations: usize,
    /// Prescreen grid steps per free parameter (0 disables the prescreen).
    pub grid_steps: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// Dense trajectory points kept in the fit file for plotting.
    pub plot_points: usize,

    pub export_results: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,
    pub debug: bool,
}

/// Sampled trajectory stored in a fit file (column-oriented for compactness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryGrid {
    pub t: Vec<f64>,
    pub susceptible: Vec<f64>,
    pub in_treatment: Vec<f64>,
    pub recovered: Vec<f64>,
}

impl TrajectoryGrid {
    pub fn from_samples(samples: &[(f64, State)]) -> Self {
        Self {
            t: samples.iter().map(|(t, _)| *t).collect(),
            susceptible: samples.iter().map(|(_, s)| s.susceptible).collect(),
            in_treatment: samples.iter().map(|(_, s)| s.in_treatment).collect(),
            recovered: samples.iter().map(|(_, s)| s.recovered).collect(),
        }
    }
}

/// A saved fit file (JSON): the portable representation of a calibrated model.
///
/// Contains the fitted parameters, fit quality, the observed series, and a
/// precomputed dense trajectory for quick plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated: String,
    pub params: ParameterSet,
    pub residual: f64,
    pub converged: bool,
    pub metrics: FitMetrics,
    pub years: Vec<i32>,
    pub t_obs: Vec<f64>,
    pub t_model: Vec<f64>,
    pub grid: TrajectoryGrid,
}
