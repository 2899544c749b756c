// nebula_core/src/models/estimation/dynamics/constant.rs

use crate::models::estimation::dynamics::EstimationDynamics;
use crate::types::State;

// --- Constant State Model ---
// Every component is carried over unchanged. Used for the orbital channel,
// where altitude and speed are held across one filter step and Q absorbs
// the real motion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantStateModel {
    pub dim: usize,
}

impl ConstantStateModel {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl EstimationDynamics for ConstantStateModel {
    fn get_state_dim(&self) -> usize {
        self.dim
    }

    fn propagate(&self, x: &State, _dt: f64) -> State {
        x.clone()
    }
}
