// nebula_core/src/models/estimation/dynamics/integrate_rate.rs

use crate::models::estimation::dynamics::EstimationDynamics;
use crate::types::State;

/// Position/rate pairs integrated with a single Euler step.
///
/// The state is laid out as `[p_0 .. p_{k-1}, r_0 .. r_{k-1}]` with `k = dim / 2`:
///
/// ```text
/// p_i <- p_i + r_i * dt
/// r_i <- r_i
/// ```
///
/// For `dim = 2` this is the atmospheric vertical channel
/// `[altitude, descent_rate]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrateRateModel {
    dim: usize,
}

impl IntegrateRateModel {
    /// Returns `None` unless `dim` is a positive even number.
    pub fn new(dim: usize) -> Option<Self> {
        if dim == 0 || dim % 2 != 0 {
            return None;
        }
        Some(Self { dim })
    }

    /// Number of position/rate pairs.
    pub fn pairs(&self) -> usize {
        self.dim / 2
    }
}

impl EstimationDynamics for IntegrateRateModel {
    fn get_state_dim(&self) -> usize {
        self.dim
    }

    fn propagate(&self, x: &State, dt: f64) -> State {
        let k = self.pairs();
        let mut next = x.clone();
        for i in 0..k {
            next[i] += x[i + k] * dt;
        }
        next
    }
}
