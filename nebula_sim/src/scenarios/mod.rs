// nebula_sim/src/scenarios/mod.rs

//! Synthetic truth generators and the pipeline that turns a scenario
//! configuration into an engine input record.

pub mod descent;
pub mod orbital;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::info;

use nebula_core::estimation::run::{FilterConfig, RunInput};

use crate::config::structs::SimulationConfig;
use crate::config::ConfigError;
use crate::prng::SimulationRng;
use crate::sensors::NoisySensor;
use orbital::OrbitPreset;

fn default_r0_km() -> f64 {
    6771.0
}

fn default_v0_kms() -> f64 {
    7.67
}

fn default_alt0_m() -> f64 {
    800.0
}

/// The truth model of a synthetic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")] // The "type" field decides which variant to parse
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Satellite in low Earth orbit: `[altitude_km, speed_kms]`.
    LeoSat {
        #[serde(default)]
        preset: OrbitPreset,
        #[serde(default = "default_r0_km")]
        r0_km: f64,
        #[serde(default = "default_v0_kms")]
        v0_kms: f64,
    },
    /// Aircraft descending after an engine failure: `[altitude_m, vertical_rate_mps]`.
    EarthEngineout {
        #[serde(default = "default_alt0_m")]
        alt0_m: f64,
    },
    /// The same descent profile flown on Mars.
    MarsUav {
        #[serde(default = "default_alt0_m")]
        alt0_m: f64,
    },
    /// Slowly oscillating orbit-like telemetry: `[altitude_km, speed_kms]`.
    Sinusoid,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario::LeoSat {
            preset: OrbitPreset::default(),
            r0_km: default_r0_km(),
            v0_kms: default_v0_kms(),
        }
    }
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::LeoSat { .. } => "leo_sat",
            Scenario::EarthEngineout { .. } => "earth_engineout",
            Scenario::MarsUav { .. } => "mars_uav",
            Scenario::Sinusoid => "sinusoid",
        }
    }

    pub fn preset(&self) -> Option<&'static str> {
        match self {
            Scenario::LeoSat { preset, .. } => Some(preset.as_str()),
            _ => None,
        }
    }

    /// Names of the truth channels, in state order.
    pub fn channels(&self) -> [&'static str; 2] {
        match self {
            Scenario::LeoSat { .. } | Scenario::Sinusoid => ["altitude_km", "speed_kms"],
            Scenario::EarthEngineout { .. } | Scenario::MarsUav { .. } => {
                ["altitude_m", "vertical_rate_mps"]
            }
        }
    }

    /// Evaluates the truth at every grid time. `dt` is the grid spacing.
    pub fn truth(&self, time: &[f64], dt: f64) -> Vec<Vec<f64>> {
        match self {
            Scenario::LeoSat {
                preset,
                r0_km,
                v0_kms,
            } => {
                let (r0, v0) = preset.initial_conditions(*r0_km, *v0_kms);
                orbital::leo_truth(time.len(), dt, r0, v0)
            }
            Scenario::EarthEngineout { alt0_m } | Scenario::MarsUav { alt0_m } => {
                descent::descent_truth(time, *alt0_m)
            }
            Scenario::Sinusoid => time.iter().map(|t| sinusoid_truth(*t)).collect(),
        }
    }
}

/// `[400 + 0.1 sin(2 pi t / 200), 7.67 + 0.01 cos(2 pi t / 200)]`
pub fn sinusoid_truth(t: f64) -> Vec<f64> {
    let phase = 2.0 * PI * t / 200.0;
    vec![400.0 + 0.1 * phase.sin(), 7.67 + 0.01 * phase.cos()]
}

/// Upper bound on the samples one scenario may generate.
pub const MAX_SAMPLES: usize = 10_000_000;

/// `floor(duration / dt) + 1`, bounded by [`MAX_SAMPLES`].
pub fn sample_count(duration_s: f64, dt_s: f64) -> Result<usize, ConfigError> {
    if !(duration_s.is_finite() && duration_s >= 0.0) {
        return Err(ConfigError::Invalid(format!(
            "duration_s must be finite and non-negative, got {duration_s}"
        )));
    }
    if !(dt_s.is_finite() && dt_s > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "dt_s must be finite and positive, got {dt_s}"
        )));
    }

    let steps = (duration_s / dt_s).floor();
    if !(steps < MAX_SAMPLES as f64) {
        return Err(ConfigError::Invalid(format!(
            "duration_s / dt_s gives more than {MAX_SAMPLES} samples"
        )));
    }
    Ok(steps as usize + 1)
}

/// `floor(duration / dt) + 1` evenly spaced samples covering `[0, duration]`.
pub fn time_grid(duration_s: f64, dt_s: f64) -> Result<Vec<f64>, ConfigError> {
    let n = sample_count(duration_s, dt_s)?;
    if n == 1 {
        return Ok(vec![0.0]);
    }
    let last = (n - 1) as f64;
    Ok((0..n).map(|k| duration_s * k as f64 / last).collect())
}

/// A generated scenario: truth, the noisy readings of it, and the engine
/// record built from both.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRun {
    pub scenario: Scenario,
    pub input: RunInput,
}

impl SyntheticRun {
    pub fn truth(&self) -> &[Vec<f64>] {
        self.input.truth.as_deref().unwrap_or(&[])
    }
}

/// Generates truth, samples the sensor and assembles the engine input.
///
/// The filter starts from the first reading unless the configuration pins
/// `x0`.
pub fn synthesize(
    config: &SimulationConfig,
    rng: &mut SimulationRng,
) -> Result<SyntheticRun, ConfigError> {
    let sim = &config.simulation;
    let time = time_grid(sim.duration_s, sim.dt_s)?;
    let states = sim.scenario.truth(&time, sim.dt_s);

    let sensor = NoisySensor::new(&config.sensor.noise_stddev)?;
    let dim = sim.scenario.channels().len();
    if sensor.channels() != dim {
        return Err(ConfigError::Invalid(format!(
            "sensor has {} noise channels but scenario '{}' has {dim}",
            sensor.channels(),
            sim.scenario.name()
        )));
    }
    let measurements = sensor.measure_series(&states, rng);

    let filter = &config.filter;
    let x0 = match (&filter.x0, measurements.first()) {
        (Some(x0), _) => x0.clone(),
        (None, Some(first)) => first.clone(),
        (None, None) => vec![0.0; dim],
    };

    info!(
        scenario = sim.scenario.name(),
        samples = time.len(),
        dt_s = sim.dt_s,
        "synthesized measurements"
    );

    Ok(SyntheticRun {
        scenario: sim.scenario.clone(),
        input: RunInput {
            state_dim: dim,
            meas_dim: dim,
            process_kind: filter.process_kind,
            time,
            measurements,
            filter: FilterConfig {
                q_diag: filter.q_diag.clone(),
                r_diag: filter.r_diag.clone(),
                x0,
                p0_diag: filter.p0_diag.clone(),
                kappa: filter.kappa,
            },
            truth: Some(states),
        },
    })
}
