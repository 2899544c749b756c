// nebula_sim/src/prelude.rs

// Re-export the entire nebula_core prelude so you can easily access
// the engine types like `RunInput`, `UnscentedKalmanFilter`, etc.
pub use nebula_core::prelude::*;

// Re-export common harness types.
pub use crate::config::{load_config, ConfigError, SimulationConfig};
pub use crate::prng::SimulationRng;
pub use crate::runlog::{CsvRunLog, RunLogEntry, RunLogSink, RunMetadata};
pub use crate::scenarios::{orbital::OrbitPreset, synthesize, Scenario, SyntheticRun};
pub use crate::sensors::NoisySensor;
pub use crate::service::{assimilate, AssimilateRequest, AssimilateResponse, ServiceError, SessionContext};
pub use crate::sweep::{best_candidate, sweep, SweepResult};
