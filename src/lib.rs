//! `str-model` library crate.
//!
//! Estimates and calibrates a three-compartment population model
//! (Susceptible / in-Treatment / Recovered) driven by an exogenous
//! vulnerable-population series, fitting simulated treatment counts to
//! observed yearly data.
//!
//! The binary (`strm`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., future GUI/daemon, notebooks, etc.)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod model;
pub mod plot;
pub mod report;
