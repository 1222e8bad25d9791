//! Data acquisition: CSV ingest and synthetic sample generation.

pub mod ingest;
pub mod sample;

pub use ingest::*;
pub use sample::*;
