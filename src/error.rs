//! Crate-wide error type.
//!
//! One enum covers the whole pipeline so the binary can map any failure to a
//! process exit code, while library callers can still match on the class:
//!
//! - `MalformedInput`: structural problems (unsorted/duplicate years, bad CSV)
//! - `InsufficientData`: not enough usable rows for an estimation step
//! - `InvalidRange`: a derived parameter fell outside its admissible range
//! - `InconsistentState`: initial-condition subtraction went negative
//! - `NumericalInstability`: a non-finite state appeared during integration
//! - `Io`: filesystem failures around exports and saved fits

#[derive(Clone)]
pub enum ModelError {
    MalformedInput(String),
    InsufficientData(String),
    /// A derived parameter violated its domain constraint.
    InvalidRange { name: &'static str, value: f64 },
    /// S0 = P0 - T0 - R0 came out negative; the caller decides whether to
    /// clamp-and-continue or abort.
    InconsistentState { s0: f64 },
    /// A non-finite state was produced at time `t`; no partial trajectory is
    /// ever returned.
    NumericalInstability { t: f64 },
    Io(String),
}

impl ModelError {
    /// Process exit code for the `strm` binary.
    ///
    /// 2 = structural input / IO, 3 = data does not support estimation,
    /// 4 = numerical failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ModelError::MalformedInput(_) | ModelError::Io(_) => 2,
            ModelError::InsufficientData(_)
            | ModelError::InvalidRange { .. }
            | ModelError::InconsistentState { .. } => 3,
            ModelError::NumericalInstability { .. } => 4,
        }
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::MalformedInput(msg) => write!(f, "Malformed input: {msg}"),
            ModelError::InsufficientData(msg) => write!(f, "Insufficient data: {msg}"),
            ModelError::InvalidRange { name, value } => {
                write!(f, "Parameter {name} = {value} is outside its valid range.")
            }
            ModelError::InconsistentState { s0 } => write!(
                f,
                "Inconsistent initial state: S0 = {s0:.4} < 0 (P0 - T0 - R0 went negative)."
            ),
            ModelError::NumericalInstability { t } => {
                write!(f, "Numerical instability: non-finite state at t = {t:.6}.")
            }
            ModelError::Io(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::fmt::Debug for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelError({self}, exit_code={})", self.exit_code())
    }
}

impl std::error::Error for ModelError {}
