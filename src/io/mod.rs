//! Output helpers.
//!
//! - per-year CSV exports (`export`)
//! - fit JSON read/write (`fitfile`)

pub mod export;
pub mod fitfile;

pub use export::*;
pub use fitfile::*;
