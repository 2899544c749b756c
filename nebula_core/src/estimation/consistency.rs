// nebula_core/src/estimation/consistency.rs

//! Filter self-consistency statistics.
//!
//! NIS (normalized innovation squared) only needs filter internals and is
//! computed on every step. NEES (normalized estimation error squared) needs
//! the true state and is therefore only available for synthetic runs. The two
//! are different quantities and are never substituted for one another.

use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// `nu^T S^-1 nu`
pub fn normalized_innovation_squared(innovation: &DVector<f64>, s_inv: &DMatrix<f64>) -> f64 {
    innovation.dot(&(s_inv * innovation))
}

/// `(x_hat - x_true)^T P^-1 (x_hat - x_true)`
///
/// Returns `None` if `P` is not positive definite.
pub fn normalized_estimation_error_squared(
    estimate: &DVector<f64>,
    covariance: &DMatrix<f64>,
    truth: &DVector<f64>,
) -> Option<f64> {
    let error = estimate - truth;
    let cholesky = Cholesky::new(covariance.clone())?;
    Some(error.dot(&cholesky.solve(&error)))
}

/// Running aggregate of the per-step NIS over one filter run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyMonitor {
    /// Degrees of freedom of the expected chi-square distribution (the
    /// measurement dimension).
    dof: usize,
    count: usize,
    sum: f64,
    max: f64,
}

impl ConsistencyMonitor {
    pub fn new(measurement_dim: usize) -> Self {
        Self {
            dof: measurement_dim,
            ..Default::default()
        }
    }

    pub fn record(&mut self, nis: f64) {
        if self.count == 0 || nis > self.max {
            self.max = nis;
        }
        self.count += 1;
        self.sum += nis;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean NIS, `0.0` before the first sample.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Largest NIS seen, `0.0` before the first sample.
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> ConsistencySummary {
        ConsistencySummary {
            steps: self.count,
            dof: self.dof,
            nis_avg: self.mean(),
            nis_max: self.max(),
        }
    }
}

/// Finalized consistency figures for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsistencySummary {
    pub steps: usize,
    pub dof: usize,
    pub nis_avg: f64,
    pub nis_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyVerdict {
    /// Mean NIS is within the tolerance band around the measurement dimension.
    Consistent,
    /// Mean NIS is too large: the filter underestimates its uncertainty.
    Overconfident,
    /// Mean NIS is too small: the filter overestimates its uncertainty.
    Underconfident,
    /// No steps were recorded.
    Insufficient,
}

impl ConsistencySummary {
    /// Classifies the run against the band `[m / tolerance, m * tolerance]`.
    ///
    /// Under correct tuning NIS follows a chi-square distribution with `m`
    /// degrees of freedom, so its mean should sit near `m`.
    pub fn verdict(&self, tolerance: f64) -> ConsistencyVerdict {
        if self.steps == 0 || self.dof == 0 {
            return ConsistencyVerdict::Insufficient;
        }
        let expected = self.dof as f64;
        let tolerance = tolerance.max(1.0);
        if self.nis_avg > expected * tolerance {
            ConsistencyVerdict::Overconfident
        } else if self.nis_avg < expected / tolerance {
            ConsistencyVerdict::Underconfident
        } else {
            ConsistencyVerdict::Consistent
        }
    }
}
