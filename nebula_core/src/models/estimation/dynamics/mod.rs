// nebula_core/src/models/estimation/dynamics/mod.rs

use crate::types::State;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A trait for dynamics models used within state estimators.
///
/// The model maps a state vector `x_k` to `x_{k+1}` over a step of length
/// `dt`. Implementations must be pure: the filter calls `propagate` once per
/// sigma point, in any order, and relies on the result depending only on the
/// arguments.
pub trait EstimationDynamics: DynClone + Debug + Send + Sync {
    /// Returns the total number of states (the length of the state vector `x`).
    fn get_state_dim(&self) -> usize;

    /// Propagates the state forward in time by `dt`.
    ///
    /// # Arguments
    /// * `x`: Current state vector (`State`).
    /// * `dt`: Time step duration. Must be non-negative.
    ///
    /// # Returns
    /// The state vector at time `t + dt` (`State`).
    fn propagate(&self, x: &State, dt: f64) -> State;
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn EstimationDynamics>`.
dyn_clone::clone_trait_object!(EstimationDynamics);

/// The built-in process models, selectable by name in a run record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    /// Every component is held constant across a step.
    #[default]
    Constant,
    /// The first half of the state integrates the second half.
    IntegrateRate,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Constant => "constant",
            ProcessKind::IntegrateRate => "integrate_rate",
        }
    }

    /// Builds the dynamics model for a state of dimension `dim`.
    ///
    /// Returns `None` if the model cannot describe a state of that size.
    pub fn build(&self, dim: usize) -> Option<Box<dyn EstimationDynamics>> {
        match self {
            ProcessKind::Constant => Some(Box::new(constant::ConstantStateModel::new(dim))),
            ProcessKind::IntegrateRate => integrate_rate::IntegrateRateModel::new(dim)
                .map(|m| Box::new(m) as Box<dyn EstimationDynamics>),
        }
    }
}

pub mod constant;
pub mod integrate_rate;
