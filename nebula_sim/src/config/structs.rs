// nebula_sim/src/config/structs.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use nebula_core::models::estimation::dynamics::ProcessKind;

use crate::scenarios::Scenario;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # SimulationConfig
/// Everything one synthetic run needs. This struct is the root of the data
/// parsed from a scenario TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct SimulationConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub filter: FilterSection,

    #[serde(default)]
    pub log: LogConfig,
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in a scenario file.
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Simulation {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Length of the generated series in seconds.
    pub duration_s: f64,
    /// Sample spacing in seconds.
    pub dt_s: f64,
    #[serde(default)]
    pub scenario: Scenario,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: None,
            duration_s: 600.0,
            dt_s: 1.0,
            scenario: Scenario::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// One standard deviation per truth channel.
    pub noise_stddev: Vec<f64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            noise_stddev: vec![0.07, 0.03],
        }
    }
}

fn default_kappa() -> f64 {
    1.0
}

/// The tuning handed to the filter. `x0` defaults to the first reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    #[serde(default)]
    pub process_kind: ProcessKind,
    pub q_diag: Vec<f64>,
    pub r_diag: Vec<f64>,
    pub p0_diag: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x0: Option<Vec<f64>>,
    #[serde(default = "default_kappa")]
    pub kappa: f64,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            process_kind: ProcessKind::Constant,
            q_diag: vec![1e-3, 1e-4],
            r_diag: vec![5e-3, 1e-3],
            p0_diag: vec![1.0, 0.1],
            x0: None,
            kappa: default_kappa(),
        }
    }
}

fn default_run_log_path() -> PathBuf {
    "logs/nebula_runs.csv".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Append a row to the run log after every assimilation.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_run_log_path")]
    pub run_log: PathBuf,
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_log: default_run_log_path(),
        }
    }
}
