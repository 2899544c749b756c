// nebula_core/src/prelude.rs

// --- Core Abstractions ---
pub use crate::error::FilterError;
pub use crate::estimation::{Innovation, StateEstimator, StepEstimate};
pub use crate::models::estimation::dynamics::{EstimationDynamics, ProcessKind};
pub use crate::models::estimation::measurement::Measurement;

// --- Core Data Structures ---
pub use crate::state::GaussianState;
pub use crate::types::{Covariance, MeasurementVector, State};

// --- Estimation Algorithms ---
pub use crate::estimation::consistency::{
    ConsistencyMonitor, ConsistencySummary, ConsistencyVerdict,
};
pub use crate::estimation::filters::ukf::{Prediction, UkfParams, UnscentedKalmanFilter};
pub use crate::estimation::run::{run_filter, run_with_models, FilterConfig, RunInput, RunOutput};

// --- Concrete Model Implementations ---
pub use crate::models::estimation::dynamics::constant::ConstantStateModel;
pub use crate::models::estimation::dynamics::integrate_rate::IntegrateRateModel;
pub use crate::models::estimation::measurement::direct::DirectObservation;
