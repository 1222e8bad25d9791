//! The three-compartment model itself.
//!
//! - `exogenous`: the P(t) driving series with intra-year interpolation
//! - `ode`: the pure right-hand side of the system
//! - `simulate`: fixed-substep RK4 integration to sampled trajectories

pub mod exogenous;
pub mod ode;
pub mod simulate;

pub use exogenous::*;
pub use ode::*;
pub use simulate::*;
