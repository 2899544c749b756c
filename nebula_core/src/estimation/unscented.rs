// nebula_core/src/estimation/unscented.rs

//! The unscented transform building blocks: weights, sigma point generation,
//! and the weighted recombination of propagated points.
//!
//! Sigma points are stored one per *column* (`dim x (2n + 1)`).

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::FilterError;
use crate::types::is_all_finite;

/// Mean and covariance weights for `2n + 1` sigma points.
#[derive(Debug, Clone, PartialEq)]
pub struct UnscentedWeights {
    /// Weights for calculating the mean from sigma points.
    pub mean: DVector<f64>,
    /// Weights for calculating the covariance from sigma points.
    pub covariance: DVector<f64>,
}

impl UnscentedWeights {
    /// `Wm[0] = Wc[0] = kappa / (n + kappa)`, every other entry `1 / (2 (n + kappa))`.
    ///
    /// The mean weights sum to one by construction. A negative `kappa` gives a
    /// negative centre weight, which is valid for the unscented transform.
    pub fn new(n: usize, kappa: f64) -> Result<Self, FilterError> {
        if n == 0 {
            return Err(FilterError::invalid("state dimension must be positive"));
        }
        let spread = n as f64 + kappa;
        if !(spread.is_finite() && spread > 0.0) {
            return Err(FilterError::invalid(format!(
                "n + kappa must be positive (n = {n}, kappa = {kappa})"
            )));
        }

        let mut mean = DVector::from_element(2 * n + 1, 1.0 / (2.0 * spread));
        mean[0] = kappa / spread;
        let covariance = mean.clone();

        Ok(Self { mean, covariance })
    }

    /// Number of sigma points these weights apply to.
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Deterministic sigma point generation for a fixed spread parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaPointGenerator {
    pub kappa: f64,
}

impl SigmaPointGenerator {
    pub fn new(kappa: f64) -> Self {
        Self { kappa }
    }

    /// Generates the `2n+1` sigma points for the belief `(x, P)`.
    ///
    /// Column 0 is `x`, columns `1..=n` are `x + L[:, i]` and columns
    /// `n+1..=2n` are `x - L[:, i]`, with `L` the lower Cholesky factor of
    /// `(n + kappa) P`.
    ///
    /// Returns `None` when `P` is not positive definite or holds non-finite
    /// entries. There is no fallback point set: a covariance that cannot be
    /// factored means the belief is already invalid.
    pub fn generate(&self, x: &DVector<f64>, p: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        let n = x.nrows();
        if p.nrows() != n || p.ncols() != n || !is_all_finite(p) {
            return None;
        }

        // Cholesky decomposition: (n + kappa) P = L * L^T
        let scaled = p * (n as f64 + self.kappa);
        let l_matrix = Cholesky::new(scaled)?.l();

        let mut sigma_points = DMatrix::zeros(n, 2 * n + 1);

        // First point is the mean.
        sigma_points.column_mut(0).copy_from(x);

        // The other 2n points are spread around the mean.
        for i in 0..n {
            let offset = l_matrix.column(i);
            sigma_points.column_mut(i + 1).copy_from(&(x + &offset));
            sigma_points.column_mut(i + n + 1).copy_from(&(x - &offset));
        }

        Some(sigma_points)
    }
}

/// `sum_i w_i * points[:, i]`
pub fn weighted_mean(points: &DMatrix<f64>, weights: &DVector<f64>) -> DVector<f64> {
    points * weights
}

/// `sum_i w_i * (points[:, i] - mean)(points[:, i] - mean)^T`
pub fn weighted_covariance(
    points: &DMatrix<f64>,
    mean: &DVector<f64>,
    weights: &DVector<f64>,
) -> DMatrix<f64> {
    let dim = points.nrows();
    let mut cov = DMatrix::zeros(dim, dim);
    for (i, column) in points.column_iter().enumerate() {
        let diff = column - mean;
        cov += weights[i] * &diff * diff.transpose();
    }
    cov
}

/// `sum_i w_i * (x_points[:, i] - x_mean)(z_points[:, i] - z_mean)^T`
pub fn weighted_cross_covariance(
    x_points: &DMatrix<f64>,
    x_mean: &DVector<f64>,
    z_points: &DMatrix<f64>,
    z_mean: &DVector<f64>,
    weights: &DVector<f64>,
) -> DMatrix<f64> {
    let mut cross = DMatrix::zeros(x_points.nrows(), z_points.nrows());
    for i in 0..x_points.ncols() {
        let diff_x = x_points.column(i) - x_mean;
        let diff_z = z_points.column(i) - z_mean;
        cross += weights[i] * &diff_x * diff_z.transpose();
    }
    cross
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_covariance() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[4.0, 1.2, 0.3, 1.2, 2.0, -0.4, 0.3, -0.4, 0.9])
    }

    #[test]
    fn weights_follow_kappa_formula() {
        let w = UnscentedWeights::new(2, 1.0).unwrap();
        assert_eq!(w.len(), 5);
        assert_abs_diff_eq!(w.mean[0], 1.0 / 3.0, epsilon = 1e-15);
        assert_abs_diff_eq!(w.covariance[0], 1.0 / 3.0, epsilon = 1e-15);
        for i in 1..5 {
            assert_abs_diff_eq!(w.mean[i], 1.0 / 6.0, epsilon = 1e-15);
            assert_eq!(w.mean[i], w.covariance[i]);
        }
        assert_abs_diff_eq!(w.mean.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn negative_centre_weight_is_allowed() {
        // n = 3, kappa = -1: centre weight -0.5, the rest 0.25.
        let w = UnscentedWeights::new(3, -1.0).unwrap();
        assert_abs_diff_eq!(w.covariance[0], -0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(w.mean.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_positive_spread_is_rejected() {
        assert!(matches!(
            UnscentedWeights::new(2, -2.0),
            Err(FilterError::InvalidInput(_))
        ));
        assert!(matches!(
            UnscentedWeights::new(0, 1.0),
            Err(FilterError::InvalidInput(_))
        ));
    }

    #[test]
    fn sigma_points_reproduce_mean_and_covariance() {
        let x = DVector::from_vec(vec![400.0, 7.67, -3.0]);
        let p = sample_covariance();
        for kappa in [0.5, 1.0, 3.0] {
            let weights = UnscentedWeights::new(3, kappa).unwrap();
            let points = SigmaPointGenerator::new(kappa).generate(&x, &p).unwrap();
            assert_eq!(points.shape(), (3, 7));

            let mean = weighted_mean(&points, &weights.mean);
            for i in 0..3 {
                assert_abs_diff_eq!(mean[i], x[i], epsilon = 1e-9);
            }

            let cov = weighted_covariance(&points, &mean, &weights.covariance);
            for (a, b) in cov.iter().zip(p.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn sigma_points_are_symmetric_about_the_mean() {
        let x = DVector::from_vec(vec![1.0, -2.0]);
        let p = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 0.25]));
        let points = SigmaPointGenerator::new(1.0).generate(&x, &p).unwrap();

        // sqrt(3 * 1.0) and sqrt(3 * 0.25) along the axes
        assert_abs_diff_eq!(points[(0, 1)], 1.0 + 3f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(points[(0, 3)], 1.0 - 3f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(points[(1, 2)], -2.0 + 0.75f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(points[(1, 4)], -2.0 - 0.75f64.sqrt(), epsilon = 1e-12);
        assert_eq!(points.column(0), x.column(0));
    }

    #[test]
    fn non_positive_definite_covariance_yields_no_points() {
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let p = DMatrix::from_diagonal(&DVector::from_vec(vec![-1.0, 0.1]));
        assert!(SigmaPointGenerator::new(1.0).generate(&x, &p).is_none());

        let p_nan = DMatrix::from_diagonal(&DVector::from_vec(vec![f64::NAN, 0.1]));
        assert!(SigmaPointGenerator::new(1.0).generate(&x, &p_nan).is_none());
    }

    #[test]
    fn cross_covariance_of_identity_map_equals_covariance() {
        let x = DVector::from_vec(vec![2.0, 5.0, 1.0]);
        let p = sample_covariance();
        let weights = UnscentedWeights::new(3, 1.0).unwrap();
        let points = SigmaPointGenerator::new(1.0).generate(&x, &p).unwrap();
        let mean = weighted_mean(&points, &weights.mean);

        let cross =
            weighted_cross_covariance(&points, &mean, &points, &mean, &weights.covariance);
        let cov = weighted_covariance(&points, &mean, &weights.covariance);
        for (a, b) in cross.iter().zip(cov.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
