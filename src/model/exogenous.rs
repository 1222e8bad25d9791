//! Exogenous vulnerable-population series P(t).
//!
//! The input is once-per-year; the integrator needs values at arbitrary real
//! times, so lookups linearly interpolate between the two bracketing years and
//! clamp to the nearest endpoint outside the tabulated range.

use crate::domain::YearRow;
use crate::error::ModelError;

/// Yearly (year, P) series. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ExogenousSeries {
    years: Vec<f64>,
    values: Vec<f64>,
}

impl ExogenousSeries {
    /// Build from (year, P) pairs. Years must be finite and strictly
    /// increasing; values must be finite.
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self, ModelError> {
        if pairs.is_empty() {
            return Err(ModelError::InsufficientData(
                "Exogenous series needs at least one (year, P) pair.".to_string(),
            ));
        }
        for &(year, value) in pairs {
            if !year.is_finite() || !value.is_finite() {
                return Err(ModelError::MalformedInput(format!(
                    "Non-finite exogenous entry (year={year}, P={value})."
                )));
            }
        }
        for w in pairs.windows(2) {
            if w[1].0 <= w[0].0 {
                return Err(ModelError::MalformedInput(format!(
                    "Exogenous years must be strictly increasing (got {} after {}).",
                    w[1].0, w[0].0
                )));
            }
        }

        Ok(Self {
            years: pairs.iter().map(|p| p.0).collect(),
            values: pairs.iter().map(|p| p.1).collect(),
        })
    }

    /// Build from already-validated table rows.
    pub fn from_rows(rows: &[YearRow]) -> Result<Self, ModelError> {
        let pairs: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (f64::from(r.year), r.population))
            .collect();
        Self::new(&pairs)
    }

    /// P(t) at an arbitrary real time.
    ///
    /// Linear interpolation inside the tabulated range; clamped to the nearest
    /// endpoint outside it.
    pub fn lookup(&self, t: f64) -> f64 {
        let n = self.years.len();
        if t <= self.years[0] {
            return self.values[0];
        }
        if t >= self.years[n - 1] {
            return self.values[n - 1];
        }

        // partition_point returns the first index with year > t; the bracket
        // is [idx-1, idx].
        let idx = self.years.partition_point(|&y| y <= t);
        let (y0, y1) = (self.years[idx - 1], self.years[idx]);
        let (v0, v1) = (self.values[idx - 1], self.values[idx]);
        let u = (t - y0) / (y1 - y0);
        v0 + u * (v1 - v0)
    }

    pub fn first_year(&self) -> f64 {
        self.years[0]
    }

    pub fn last_year(&self) -> f64 {
        self.years[self.years.len() - 1]
    }
}
