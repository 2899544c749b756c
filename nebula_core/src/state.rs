// nebula_core/src/state.rs

use nalgebra::DMatrix;

use crate::types::{diagonal_covariance, is_all_finite, Covariance, State};

/// The Gaussian belief owned by a filter: the state vector `x`, its
/// covariance `P`, and the time the belief refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianState {
    /// The actual numerical data vector `x`.
    pub vector: State,
    /// The covariance matrix `P`.
    pub covariance: Covariance,
    /// The timestamp of the last update.
    pub last_update_timestamp: f64,
}

impl GaussianState {
    pub fn new(vector: State, covariance: Covariance, timestamp: f64) -> Self {
        Self {
            vector,
            covariance,
            last_update_timestamp: timestamp,
        }
    }

    /// Creates a state from an initial mean and the diagonal of its covariance.
    pub fn from_diagonal(x0: &[f64], p0_diag: &[f64], timestamp: f64) -> Self {
        Self::new(
            State::from_column_slice(x0),
            diagonal_covariance(p0_diag),
            timestamp,
        )
    }

    /// Returns the dimension (number of rows) of the state vector.
    pub fn dim(&self) -> usize {
        self.vector.nrows()
    }

    /// The diagonal of `P` (per-component variances) as a plain vector.
    pub fn covariance_diagonal(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().copied().collect()
    }

    /// Forces `P` to be exactly symmetric: `P <- (P + P^T) / 2`.
    pub fn symmetrize(&mut self) {
        self.covariance = symmetrized(&self.covariance);
    }

    /// `true` when both `x` and `P` are finite and every variance on the
    /// diagonal of `P` is strictly positive.
    pub fn is_well_formed(&self) -> bool {
        self.vector.iter().all(|v| v.is_finite())
            && is_all_finite(&self.covariance)
            && self.covariance.diagonal().iter().all(|v| *v > 0.0)
    }
}

pub(crate) fn symmetrized(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}
