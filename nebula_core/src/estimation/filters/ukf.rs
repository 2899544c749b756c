// nebula_core/src/estimation/filters/ukf.rs

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

// --- Core Library Imports ---
use crate::error::FilterError;
use crate::estimation::consistency::normalized_innovation_squared;
use crate::estimation::unscented::{
    weighted_covariance, weighted_cross_covariance, weighted_mean, SigmaPointGenerator,
    UnscentedWeights,
};
use crate::estimation::{Innovation, StateEstimator, StepEstimate};
use crate::models::estimation::dynamics::EstimationDynamics;
use crate::models::estimation::measurement::Measurement;
use crate::state::GaussianState;
use crate::types::{is_all_finite, MeasurementVector};

/// Configuration parameters for the UKF's sigma point generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UkfParams {
    pub kappa: f64, // Spread of the sigma points; n + kappa must be positive
}

impl Default for UkfParams {
    fn default() -> Self {
        Self { kappa: 1.0 }
    }
}

/// The output of the predict phase. It is consumed by `update`, which needs
/// the propagated sigma points as well as their moments.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Propagated sigma points, one per column.
    pub sigma_points: DMatrix<f64>,
    /// Predicted mean `x^-`.
    pub mean: DVector<f64>,
    /// Predicted covariance `P^-`, including `Q`.
    pub covariance: DMatrix<f64>,
    /// The step length the prediction covers.
    pub dt: f64,
}

/// A concrete implementation of an Unscented Kalman Filter.
///
/// The filter is generic over the state and measurement dimensions; both are
/// fixed at construction by the initial state and the measurement model.
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter {
    state: GaussianState,
    process_noise_q: DMatrix<f64>,
    dynamics_model: Box<dyn EstimationDynamics>,
    measurement_model: Box<dyn Measurement>,
    params: UkfParams,

    // --- UKF-specific internal state ---
    sigma_generator: SigmaPointGenerator,
    weights: UnscentedWeights,
    /// Index of the next step to run.
    step: usize,
}

impl UnscentedKalmanFilter {
    pub fn new(
        initial_state: GaussianState,
        process_noise_q: DMatrix<f64>,
        dynamics_model: Box<dyn EstimationDynamics>,
        measurement_model: Box<dyn Measurement>,
        params: UkfParams,
    ) -> Result<Self, FilterError> {
        let n = initial_state.dim();
        let weights = UnscentedWeights::new(n, params.kappa)?;

        if initial_state.covariance.shape() != (n, n) {
            return Err(FilterError::invalid(format!(
                "initial covariance is {:?}, expected ({n}, {n})",
                initial_state.covariance.shape()
            )));
        }
        if process_noise_q.shape() != (n, n) {
            return Err(FilterError::invalid(format!(
                "process noise Q is {:?}, expected ({n}, {n})",
                process_noise_q.shape()
            )));
        }
        if dynamics_model.get_state_dim() != n {
            return Err(FilterError::invalid(format!(
                "dynamics model has state dimension {}, expected {n}",
                dynamics_model.get_state_dim()
            )));
        }
        let m = measurement_model.get_measurement_dim();
        if m == 0 {
            return Err(FilterError::invalid("measurement dimension must be positive"));
        }
        if measurement_model.get_r().shape() != (m, m) {
            return Err(FilterError::invalid(format!(
                "measurement noise R is {:?}, expected ({m}, {m})",
                measurement_model.get_r().shape()
            )));
        }

        Ok(Self {
            state: initial_state,
            process_noise_q,
            dynamics_model,
            measurement_model,
            params,
            sigma_generator: SigmaPointGenerator::new(params.kappa),
            weights,
            step: 0,
        })
    }

    pub fn params(&self) -> UkfParams {
        self.params
    }

    /// Predict phase. Does not modify the filter.
    pub fn predict(&self, dt: f64) -> Result<Prediction, FilterError> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(FilterError::invalid(format!(
                "step {} has an invalid time step {dt}",
                self.step
            )));
        }
        let n = self.state.dim();

        // --- 1. Generate Sigma Points ---
        let sigma_points = self
            .sigma_generator
            .generate(&self.state.vector, &self.state.covariance)
            .ok_or_else(|| {
                warn!(step = self.step, "covariance failed Cholesky factorization");
                FilterError::NumericalInstability { step: self.step }
            })?;

        // --- 2. Propagate each point through the NON-LINEAR dynamics model ---
        let mut propagated_points = DMatrix::zeros(n, sigma_points.ncols());
        for (i, point) in sigma_points.column_iter().enumerate() {
            let propagated = self.dynamics_model.propagate(&point.into_owned(), dt);
            if propagated.nrows() != n {
                return Err(FilterError::invalid(format!(
                    "dynamics model returned {} states, expected {n}",
                    propagated.nrows()
                )));
            }
            propagated_points.column_mut(i).copy_from(&propagated);
        }

        // --- 3. Recover the predicted mean and covariance ---
        let x_pred = weighted_mean(&propagated_points, &self.weights.mean);
        let p_pred = weighted_covariance(&propagated_points, &x_pred, &self.weights.covariance)
            + &self.process_noise_q;

        Ok(Prediction {
            sigma_points: propagated_points,
            mean: x_pred,
            covariance: p_pred,
            dt,
        })
    }

    /// Update phase. Fuses `z` into `prediction` and commits the result.
    ///
    /// The predicted sigma points are reused as-is for the measurement
    /// transform. Nothing is committed unless every check passes.
    pub fn update(
        &mut self,
        prediction: &Prediction,
        z: &MeasurementVector,
    ) -> Result<Innovation, FilterError> {
        let m = self.measurement_model.get_measurement_dim();
        if z.nrows() != m {
            return Err(FilterError::invalid(format!(
                "step {} has a measurement of length {}, expected {m}",
                self.step,
                z.nrows()
            )));
        }

        // --- 1. Propagate points through the NON-LINEAR measurement model ---
        let n_points = prediction.sigma_points.ncols();
        let mut measurement_points = DMatrix::zeros(m, n_points);
        for (i, point) in prediction.sigma_points.column_iter().enumerate() {
            let z_point = self
                .measurement_model
                .predict_measurement(&point.into_owned());
            if z_point.nrows() != m {
                return Err(FilterError::invalid(format!(
                    "measurement model returned {} values, expected {m}",
                    z_point.nrows()
                )));
            }
            measurement_points.column_mut(i).copy_from(&z_point);
        }

        // --- 2. Recover the predicted measurement and its covariance ---
        let z_pred = weighted_mean(&measurement_points, &self.weights.mean);
        let s_cov = weighted_covariance(&measurement_points, &z_pred, &self.weights.covariance)
            + self.measurement_model.get_r();

        // --- 3. Calculate cross-covariance and Kalman Gain ---
        let t_cov = weighted_cross_covariance(
            &prediction.sigma_points,
            &prediction.mean,
            &measurement_points,
            &z_pred,
            &self.weights.covariance,
        );

        let s_inv = match s_cov.clone().try_inverse() {
            Some(inv) if is_all_finite(&inv) => inv,
            _ => {
                warn!(step = self.step, "innovation covariance is not invertible");
                return Err(FilterError::SingularInnovationCovariance { step: self.step });
            }
        };
        let k_gain = &t_cov * &s_inv;

        // --- 4. Update state and covariance ---
        let residual = z - &z_pred;
        let mut updated = GaussianState::new(
            &prediction.mean + &k_gain * &residual,
            &prediction.covariance - &k_gain * &s_cov * k_gain.transpose(),
            self.state.last_update_timestamp + prediction.dt,
        );
        // Tiny numerical errors can make P slightly non-symmetric. This forces it.
        updated.symmetrize();

        if !updated.is_well_formed() {
            warn!(step = self.step, "posterior covariance lost positivity");
            return Err(FilterError::NumericalInstability { step: self.step });
        }

        let nis = normalized_innovation_squared(&residual, &s_inv);
        debug!(step = self.step, nis, "ukf step committed");

        self.state = updated;
        self.step += 1;

        Ok(Innovation {
            predicted_measurement: z_pred,
            residual,
            covariance: s_cov,
            nis,
        })
    }
}

impl StateEstimator for UnscentedKalmanFilter {
    fn process(&mut self, dt: f64, z: &MeasurementVector) -> Result<StepEstimate, FilterError> {
        let step = self.step;
        let prediction = self.predict(dt)?;
        let innovation = self.update(&prediction, z)?;
        Ok(StepEstimate {
            step,
            state: self.state.clone(),
            innovation,
        })
    }

    fn get_state(&self) -> &GaussianState {
        &self.state
    }

    fn steps_completed(&self) -> usize {
        self.step
    }
}
