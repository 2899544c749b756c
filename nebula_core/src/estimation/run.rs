// nebula_core/src/estimation/run.rs

//! Record-driven filter runs.
//!
//! A `RunInput` bundles a measurement series with a named filter
//! configuration; `run_filter` validates it, builds the models it names, and
//! drives a UKF over the whole series. The result is a `RunOutput`, which
//! keeps every step completed before a numerical failure.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FilterError;
use crate::estimation::consistency::{
    normalized_estimation_error_squared, ConsistencyMonitor, ConsistencySummary,
};
use crate::estimation::filters::ukf::{UkfParams, UnscentedKalmanFilter};
use crate::estimation::StateEstimator;
use crate::models::estimation::dynamics::{EstimationDynamics, ProcessKind};
use crate::models::estimation::measurement::direct::DirectObservation;
use crate::models::estimation::measurement::Measurement;
use crate::state::GaussianState;
use crate::types::{diagonal_covariance, MeasurementVector};

fn default_kappa() -> f64 {
    1.0
}

/// Noise and initial-belief parameters for one run, by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Diagonal of the process noise covariance `Q` (length n).
    #[serde(rename = "Q_diag")]
    pub q_diag: Vec<f64>,
    /// Diagonal of the measurement noise covariance `R` (length m).
    #[serde(rename = "R_diag")]
    pub r_diag: Vec<f64>,
    /// Initial state estimate (length n).
    pub x0: Vec<f64>,
    /// Diagonal of the initial covariance `P0` (length n).
    #[serde(rename = "P0_diag")]
    pub p0_diag: Vec<f64>,
    /// Sigma point spread parameter.
    #[serde(default = "default_kappa")]
    pub kappa: f64,
}

impl FilterConfig {
    /// Checks lengths and finiteness against the state (`n`) and measurement
    /// (`m`) dimensions.
    ///
    /// `P0` is only checked for finiteness: whether it is positive definite
    /// is decided by the filter at step 0.
    pub fn validate(&self, n: usize, m: usize) -> Result<(), FilterError> {
        if n == 0 || m == 0 {
            return Err(FilterError::invalid(format!(
                "state and measurement dimensions must be positive (n = {n}, m = {m})"
            )));
        }
        check_len("Q_diag", &self.q_diag, n)?;
        check_len("x0", &self.x0, n)?;
        check_len("P0_diag", &self.p0_diag, n)?;
        check_len("R_diag", &self.r_diag, m)?;

        for (name, values) in [
            ("Q_diag", &self.q_diag),
            ("R_diag", &self.r_diag),
            ("x0", &self.x0),
            ("P0_diag", &self.p0_diag),
        ] {
            check_finite(name, values)?;
        }
        for (name, values) in [("Q_diag", &self.q_diag), ("R_diag", &self.r_diag)] {
            if values.iter().any(|v| *v < 0.0) {
                return Err(FilterError::invalid(format!("{name} has a negative variance")));
            }
        }

        let spread = n as f64 + self.kappa;
        if !(spread.is_finite() && spread > 0.0) {
            return Err(FilterError::invalid(format!(
                "n + kappa must be positive (n = {n}, kappa = {})",
                self.kappa
            )));
        }
        Ok(())
    }

    pub fn params(&self) -> UkfParams {
        UkfParams { kappa: self.kappa }
    }
}

/// The engine input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    pub state_dim: usize,
    pub meas_dim: usize,
    pub process_kind: ProcessKind,
    /// Sample times, non-decreasing.
    pub time: Vec<f64>,
    /// One measurement vector per sample time.
    pub measurements: Vec<Vec<f64>>,
    #[serde(flatten)]
    pub filter: FilterConfig,
    /// True states, when known. Enables the NEES diagnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<Vec<Vec<f64>>>,
}

impl RunInput {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        let (n, m) = (self.state_dim, self.meas_dim);
        self.filter.validate(n, m)?;

        if m != n {
            return Err(FilterError::invalid(format!(
                "direct observation needs meas_dim == state_dim (got {m} and {n})"
            )));
        }
        if self.process_kind == ProcessKind::IntegrateRate && n % 2 != 0 {
            return Err(FilterError::invalid(format!(
                "integrate_rate needs an even state dimension, got {n}"
            )));
        }
        validate_series(&self.time, &self.measurements, m)?;

        if let Some(truth) = &self.truth {
            validate_truth(truth, self.time.len(), n)?;
        }
        Ok(())
    }
}

/// The engine output record.
///
/// On a numerical failure at step `k` the per-step arrays hold steps
/// `0..k` and `failed_at_step` is `Some(k)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub x_est: Vec<Vec<f64>>,
    #[serde(rename = "P_diag")]
    pub p_diag: Vec<Vec<f64>>,
    pub nis: Vec<f64>,
    pub nis_avg: f64,
    pub nis_max: f64,
    pub failed_at_step: Option<usize>,
    /// Per-step NEES, only when the input carried a truth series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nees: Option<Vec<f64>>,
    /// The error that stopped the run, if any.
    #[serde(skip)]
    pub failure: Option<FilterError>,
}

impl RunOutput {
    /// Number of completed steps.
    pub fn len(&self) -> usize {
        self.x_est.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_est.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// NIS figures of the completed steps against `measurement_dim` degrees of freedom.
    pub fn consistency(&self, measurement_dim: usize) -> ConsistencySummary {
        ConsistencySummary {
            steps: self.nis.len(),
            dof: measurement_dim,
            nis_avg: self.nis_avg,
            nis_max: self.nis_max,
        }
    }

    /// Turns a failed run into its error, dropping the partial results.
    pub fn into_result(self) -> Result<RunOutput, FilterError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Per-step time deltas. The first sample gets `dt = 0`.
pub fn delta_times(time: &[f64]) -> Vec<f64> {
    let mut dts = Vec::with_capacity(time.len());
    let mut previous = time.first().copied();
    for &t in time {
        dts.push(previous.map_or(0.0, |p| t - p));
        previous = Some(t);
    }
    dts
}

/// Validates and runs the record with the built-in models it names.
///
/// Returns `Err` only for `InvalidInput`; numerical failures are reported
/// inside the returned `RunOutput`.
pub fn run_filter(input: &RunInput) -> Result<RunOutput, FilterError> {
    input.validate()?;

    let dynamics = input.process_kind.build(input.state_dim).ok_or_else(|| {
        FilterError::invalid(format!(
            "{} cannot model a state of dimension {}",
            input.process_kind.as_str(),
            input.state_dim
        ))
    })?;
    let measurement = Box::new(DirectObservation::from_variances(&input.filter.r_diag));

    run_with_models(
        &input.filter,
        &input.time,
        &input.measurements,
        dynamics,
        measurement,
        input.truth.as_deref(),
    )
}

/// Runs a UKF built from arbitrary models over a measurement series.
pub fn run_with_models(
    config: &FilterConfig,
    time: &[f64],
    measurements: &[Vec<f64>],
    dynamics: Box<dyn EstimationDynamics>,
    measurement: Box<dyn Measurement>,
    truth: Option<&[Vec<f64>]>,
) -> Result<RunOutput, FilterError> {
    let n = config.x0.len();
    let m = measurement.get_measurement_dim();
    config.validate(n, m)?;
    validate_series(time, measurements, m)?;
    if let Some(truth) = truth {
        validate_truth(truth, time.len(), n)?;
    }

    let start = time.first().copied().unwrap_or(0.0);
    let initial_state = GaussianState::from_diagonal(&config.x0, &config.p0_diag, start);
    let mut filter = UnscentedKalmanFilter::new(
        initial_state,
        diagonal_covariance(&config.q_diag),
        dynamics,
        measurement,
        config.params(),
    )?;

    drive(&mut filter, m, &delta_times(time), measurements, truth)
}

/// Feeds a measurement series through any estimator and collects the run record.
pub fn drive<E: StateEstimator + ?Sized>(
    estimator: &mut E,
    measurement_dim: usize,
    dts: &[f64],
    measurements: &[Vec<f64>],
    truth: Option<&[Vec<f64>]>,
) -> Result<RunOutput, FilterError> {
    debug!(steps = dts.len(), measurement_dim, "starting filter run");

    let mut output = RunOutput {
        nees: truth.map(|_| Vec::with_capacity(dts.len())),
        ..Default::default()
    };
    let mut monitor = ConsistencyMonitor::new(measurement_dim);

    for (k, (dt, z)) in dts.iter().zip(measurements).enumerate() {
        let z = MeasurementVector::from_column_slice(z);
        let estimate = match estimator.process(*dt, &z) {
            Ok(estimate) => estimate,
            Err(err @ FilterError::InvalidInput(_)) => return Err(err),
            Err(err) => {
                warn!(step = k, error = %err, "filter run aborted");
                output.failed_at_step = err.step().or(Some(k));
                output.failure = Some(err);
                break;
            }
        };

        let state = &estimate.state;
        output.x_est.push(state.vector.iter().copied().collect());
        output.p_diag.push(state.covariance_diagonal());
        output.nis.push(estimate.innovation.nis);
        monitor.record(estimate.innovation.nis);

        if let (Some(nees), Some(row)) = (output.nees.as_mut(), truth.and_then(|t| t.get(k))) {
            let x_true = DVector::from_column_slice(row);
            nees.push(
                normalized_estimation_error_squared(&state.vector, &state.covariance, &x_true)
                    .unwrap_or(f64::NAN),
            );
        }
    }

    let summary = monitor.summary();
    output.nis_avg = summary.nis_avg;
    output.nis_max = summary.nis_max;
    debug!(
        completed = output.len(),
        nis_avg = output.nis_avg,
        nis_max = output.nis_max,
        "filter run finished"
    );
    Ok(output)
}

fn validate_series(time: &[f64], measurements: &[Vec<f64>], m: usize) -> Result<(), FilterError> {
    if time.len() != measurements.len() {
        return Err(FilterError::invalid(format!(
            "time has {} samples but measurements has {}",
            time.len(),
            measurements.len()
        )));
    }
    check_finite("time", time)?;
    if let Some(k) = time.windows(2).position(|w| w[1] < w[0]) {
        return Err(FilterError::invalid(format!(
            "time decreases between samples {k} and {}",
            k + 1
        )));
    }
    for (k, z) in measurements.iter().enumerate() {
        check_len(&format!("measurements[{k}]"), z, m)?;
        check_finite(&format!("measurements[{k}]"), z)?;
    }
    Ok(())
}

fn validate_truth(truth: &[Vec<f64>], len: usize, n: usize) -> Result<(), FilterError> {
    if truth.len() != len {
        return Err(FilterError::invalid(format!(
            "truth has {} rows but time has {len}",
            truth.len()
        )));
    }
    for (k, row) in truth.iter().enumerate() {
        check_len(&format!("truth[{k}]"), row, n)?;
        check_finite(&format!("truth[{k}]"), row)?;
    }
    Ok(())
}

fn check_len(name: &str, values: &[f64], expected: usize) -> Result<(), FilterError> {
    if values.len() != expected {
        return Err(FilterError::invalid(format!(
            "{name} has length {}, expected {expected}",
            values.len()
        )));
    }
    Ok(())
}

fn check_finite(name: &str, values: &[f64]) -> Result<(), FilterError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::invalid(format!("{name} contains a non-finite value")));
    }
    Ok(())
}
