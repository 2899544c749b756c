// nebula_core/src/estimation/mod.rs

use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::state::GaussianState;
use crate::types::MeasurementVector;

/// The measurement residual of one update, with the quantities needed to
/// judge it.
#[derive(Debug, Clone, PartialEq)]
pub struct Innovation {
    /// The predicted measurement `z_hat`.
    pub predicted_measurement: DVector<f64>,
    /// `nu = z - z_hat`
    pub residual: DVector<f64>,
    /// The innovation covariance `S`.
    pub covariance: DMatrix<f64>,
    /// Normalized innovation squared, `nu^T S^-1 nu`.
    pub nis: f64,
}

/// Everything one completed predict/update cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEstimate {
    /// Zero-based index of the step.
    pub step: usize,
    /// The posterior belief after the update.
    pub state: GaussianState,
    pub innovation: Innovation,
}

/// The contract for any algorithm that performs the "State Estimator" role.
/// Its sole responsibility is to estimate the state of one system from an
/// ordered stream of measurements.
pub trait StateEstimator: Send + Sync {
    /// Advances the belief by `dt` and fuses the measurement `z`.
    ///
    /// On error the belief is left exactly as it was after the previous step.
    fn process(&mut self, dt: f64, z: &MeasurementVector) -> Result<StepEstimate, FilterError>;

    /// Returns a reference to the current best estimate of the state.
    fn get_state(&self) -> &GaussianState;

    /// Number of steps committed so far; also the index of the next step.
    fn steps_completed(&self) -> usize;
}

pub mod consistency;
pub mod filters;
pub mod run;
pub mod unscented;
