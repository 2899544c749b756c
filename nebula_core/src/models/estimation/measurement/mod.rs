// nebula_core/src/models/estimation/measurement/mod.rs

use crate::types::{MeasurementVector, State};
use dyn_clone::DynClone;
use nalgebra::DMatrix;
use std::fmt::Debug;

// --- MEASUREMENT MODEL TRAIT ---
// Represents the mathematical model of a sensor. `z = h(x) + v`
pub trait Measurement: DynClone + Debug + Send + Sync {
    /// Length of the measurement vector `z`.
    fn get_measurement_dim(&self) -> usize;

    /// Returns the measurement noise covariance matrix `R`.
    fn get_r(&self) -> &DMatrix<f64>;

    /// **Predicts the ideal measurement `z_pred = h(x)` from a state vector.**
    ///
    /// The UKF calls this once per predicted sigma point, so it must not
    /// depend on anything but `x`.
    fn predict_measurement(&self, x: &State) -> MeasurementVector;
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn Measurement>`.
dyn_clone::clone_trait_object!(Measurement);

pub mod direct;
