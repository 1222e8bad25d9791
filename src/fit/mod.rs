//! Parameter estimation.
//!
//! - `linear`: closed-form estimates from the yearly table (δ, δₛ, δₙ, m, ψ)
//! - `initial`: initial compartment state from the first observed year
//! - `calibrate`: bounded least-squares calibration of the free parameters

pub mod calibrate;
pub mod initial;
pub mod linear;

pub use calibrate::*;
pub use initial::*;
pub use linear::*;
