// nebula_sim/src/sensors.rs

use rand_distr::{Distribution, Normal};

use crate::config::ConfigError;
use crate::prng::SimulationRng;

/// A synthetic sensor that reads every truth channel with independent,
/// zero-mean Gaussian noise.
#[derive(Debug, Clone)]
pub struct NoisySensor {
    stddev: Vec<f64>,
    // Store the noise distributions for efficiency
    noise: Vec<Normal<f64>>,
}

impl NoisySensor {
    pub fn new(stddev: &[f64]) -> Result<Self, ConfigError> {
        let noise = stddev
            .iter()
            .map(|s| {
                if !(s.is_finite() && *s >= 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "sensor noise stddev must be finite and non-negative, got {s}"
                    )));
                }
                Normal::new(0.0, *s).map_err(|e| {
                    ConfigError::Invalid(format!("sensor noise stddev {s} is invalid: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            stddev: stddev.to_vec(),
            noise,
        })
    }

    pub fn channels(&self) -> usize {
        self.noise.len()
    }

    /// Per-channel noise variances, i.e. the matched `R` diagonal.
    pub fn variances(&self) -> Vec<f64> {
        self.stddev.iter().map(|s| s * s).collect()
    }

    /// Reads one truth sample. Extra truth channels are ignored.
    pub fn measure(&self, truth: &[f64], rng: &mut SimulationRng) -> Vec<f64> {
        truth
            .iter()
            .zip(&self.noise)
            .map(|(x, dist)| x + dist.sample(&mut rng.0))
            .collect()
    }

    /// Reads a whole truth series, drawing noise sample by sample.
    pub fn measure_series(&self, states: &[Vec<f64>], rng: &mut SimulationRng) -> Vec<Vec<f64>> {
        states.iter().map(|x| self.measure(x, rng)).collect()
    }
}
