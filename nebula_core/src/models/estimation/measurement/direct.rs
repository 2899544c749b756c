// nebula_core/src/models/estimation/measurement/direct.rs

use crate::models::estimation::measurement::Measurement;
use crate::types::{diagonal_covariance, MeasurementVector, State};
use nalgebra::DMatrix;

/// A sensor that observes the full state vector directly: `z = x + v`.
#[derive(Debug, Clone)] // Make sure it's cloneable for the dyn-clone
pub struct DirectObservation {
    // The R matrix for this sensor
    pub noise_covariance: DMatrix<f64>,
}

impl DirectObservation {
    pub fn new(noise_covariance: DMatrix<f64>) -> Self {
        Self { noise_covariance }
    }

    /// Builds the model from per-component measurement variances.
    pub fn from_variances(r_diag: &[f64]) -> Self {
        Self::new(diagonal_covariance(r_diag))
    }
}

impl Measurement for DirectObservation {
    fn get_measurement_dim(&self) -> usize {
        self.noise_covariance.nrows()
    }

    fn get_r(&self) -> &DMatrix<f64> {
        &self.noise_covariance
    }

    fn predict_measurement(&self, x: &State) -> MeasurementVector {
        x.clone()
    }
}
