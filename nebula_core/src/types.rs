// nebula_core/src/types.rs

use nalgebra::{DMatrix, DVector};

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type MeasurementVector = DVector<f64>;
pub type Covariance = DMatrix<f64>;

/// Builds a diagonal covariance matrix from a slice of variances.
///
/// Q, R and P0 are all supplied this way by callers.
pub fn diagonal_covariance(diag: &[f64]) -> Covariance {
    DMatrix::from_diagonal(&DVector::from_column_slice(diag))
}

/// Returns `true` if every entry of the matrix is finite.
pub fn is_all_finite(m: &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}
