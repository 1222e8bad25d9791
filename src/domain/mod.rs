//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input rows and run configuration (`YearRow`, `RunConfig`)
//! - the immutable parameter snapshot (`ParameterSet`)
//! - compartment state and calibration outputs (`State`, `CalibrationResult`)

pub mod types;

pub use types::*;
