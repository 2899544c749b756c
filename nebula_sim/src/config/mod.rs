// nebula_sim/src/config/mod.rs

//! This module handles loading and validating a run configuration from disk.
//! Values come from the scenario TOML file, then from `NEBULA_` environment
//! variables (`NEBULA_SIMULATION__SEED=7` sets `simulation.seed`). Only
//! variables naming one of the config sections are read, so unrelated
//! `NEBULA_*` variables are ignored.

pub mod structs;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::scenarios::sample_count;
use crate::sensors::NoisySensor;

pub use structs::{FilterSection, LogConfig, SensorConfig, Simulation, SimulationConfig};

/// Top-level sections an environment variable may override.
const ENV_SECTIONS: [&str; 4] = ["simulation", "sensor", "filter", "log"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Loads the scenario at `path`, applies environment overrides and
/// validates the result.
pub fn load_config(path: &Path) -> Result<SimulationConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    info!("Loading scenario from: {}", path.display());

    let config: SimulationConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(env_overrides())
        .extract()?;
    config.validate()?;
    Ok(config)
}

fn env_overrides() -> Env {
    Env::prefixed("NEBULA_")
        .filter(|key| {
            key.as_str()
                .split("__")
                .next()
                .map_or(false, |section| {
                    ENV_SECTIONS.iter().any(|s| section.eq_ignore_ascii_case(s))
                })
        })
        .split("__")
}

impl SimulationConfig {
    /// Checks the parts of the configuration the filter does not check
    /// itself. Filter tuning is validated by the engine when the run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(sim.dt_s.is_finite() && sim.dt_s > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "simulation.dt_s must be positive, got {}",
                sim.dt_s
            )));
        }
        if !(sim.duration_s.is_finite() && sim.duration_s >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "simulation.duration_s must be non-negative, got {}",
                sim.duration_s
            )));
        }

        sample_count(sim.duration_s, sim.dt_s)?;

        let channels = sim.scenario.channels().len();
        if self.sensor.noise_stddev.len() != channels {
            return Err(ConfigError::Invalid(format!(
                "sensor.noise_stddev needs {channels} entries for scenario '{}'",
                sim.scenario.name()
            )));
        }
        NoisySensor::new(&self.sensor.noise_stddev)?;
        Ok(())
    }

    /// The resolved configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{orbital::OrbitPreset, Scenario};
    use figment::Jail;
    use nebula_core::models::estimation::dynamics::ProcessKind;

    const DESCENT: &str = r#"
        [simulation]
        seed = 42
        duration_s = 60.0
        dt_s = 0.5
        scenario = { type = "earth_engineout", alt0_m = 900.0 }

        [sensor]
        noise_stddev = [3.0, 0.2]

        [filter]
        process_kind = "integrate_rate"
        q_diag = [25.0, 0.5]
        r_diag = [9.0, 0.04]
        p0_diag = [4.0, 0.25]
        x0 = [900.0, -0.5]

        [log]
        enabled = false
    "#;

    #[test]
    fn loads_scenario_file() {
        Jail::expect_with(|jail| {
            jail.create_file("descent.toml", DESCENT)?;
            let config = load_config(Path::new("descent.toml")).map_err(|e| e.to_string())?;

            assert_eq!(config.simulation.seed, Some(42));
            assert_eq!(
                config.simulation.scenario,
                Scenario::EarthEngineout { alt0_m: 900.0 }
            );
            assert_eq!(config.filter.process_kind, ProcessKind::IntegrateRate);
            assert_eq!(config.filter.x0, Some(vec![900.0, -0.5]));
            assert_eq!(config.filter.kappa, 1.0);
            assert!(!config.log.enabled);
            assert_eq!(config.log.run_log, PathBuf::from("logs/nebula_runs.csv"));
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("descent.toml", DESCENT)?;
            jail.set_env("NEBULA_SIMULATION__SEED", 7);
            jail.set_env("NEBULA_FILTER__KAPPA", 0.5);
            let config = load_config(Path::new("descent.toml")).map_err(|e| e.to_string())?;

            assert_eq!(config.simulation.seed, Some(7));
            assert_eq!(config.filter.kappa, 0.5);
            Ok(())
        });
    }

    #[test]
    fn unrelated_environment_variables_are_ignored() {
        Jail::expect_with(|jail| {
            jail.create_file("descent.toml", DESCENT)?;
            jail.set_env("NEBULA_LOG_LEVEL", "debug");
            jail.set_env("NEBULA_TOKEN", "abc");
            jail.set_env("NEBULA_LOG__ENABLED", true);
            let config = load_config(Path::new("descent.toml")).map_err(|e| e.to_string())?;

            assert!(config.log.enabled);
            assert_eq!(config.simulation.seed, Some(42));
            Ok(())
        });
    }

    #[test]
    fn missing_sections_use_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("leo.toml", "[simulation]\nduration_s = 120.0\ndt_s = 1.0\n")?;
            let config = load_config(Path::new("leo.toml")).map_err(|e| e.to_string())?;

            assert_eq!(
                config.simulation.scenario,
                Scenario::LeoSat {
                    preset: OrbitPreset::Circular,
                    r0_km: 6771.0,
                    v0_kms: 7.67
                }
            );
            assert_eq!(config.filter, FilterSection::default());
            Ok(())
        });
    }

    #[test]
    fn unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[simulation]\nduration_s = 1.0\ndt_s = 1.0\nspeed = 3\n")?;
            assert!(matches!(
                load_config(Path::new("bad.toml")),
                Err(ConfigError::Load(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_config(Path::new("does/not/exist.toml")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn validation_catches_bad_grid_and_sensor() {
        let mut config = SimulationConfig::default();
        assert!(config.validate().is_ok());

        config.simulation.dt_s = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SimulationConfig::default();
        config.sensor.noise_stddev = vec![1.0, 2.0, 3.0];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SimulationConfig::default();
        config.sensor.noise_stddev = vec![-0.07, 0.03];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SimulationConfig::default();
        config.simulation.duration_s = f64::MAX;
        config.simulation.dt_s = 1e-300;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn renders_back_to_toml() {
        let mut config = SimulationConfig::default();
        config.simulation.seed = Some(3);
        let text = config.to_toml().unwrap();
        let parsed: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
