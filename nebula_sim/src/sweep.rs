// nebula_sim/src/sweep.rs

//! Noise tuning sweep: the same measurement series filtered under a grid of
//! `Q` and `R` scalings, one independent run per candidate.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use nebula_core::error::FilterError;
use nebula_core::estimation::consistency::ConsistencyVerdict;
use nebula_core::estimation::run::{run_filter, RunInput};

/// Outcome of one candidate tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub q_scale: f64,
    pub r_scale: f64,
    pub nis_avg: f64,
    pub nis_max: f64,
    pub failed_at_step: Option<usize>,
    pub verdict: ConsistencyVerdict,
}

impl SweepResult {
    /// Distance of the mean NIS from its expected value `dof`, on a log scale.
    fn mismatch(&self, dof: usize) -> f64 {
        if self.failed_at_step.is_some() || self.nis_avg <= 0.0 {
            return f64::INFINITY;
        }
        (self.nis_avg / dof as f64).ln().abs()
    }
}

/// Runs every `(q_scale, r_scale)` pair drawn from `scales`, in parallel.
///
/// Results come back in row-major order over `scales x scales`. An invalid
/// base record fails the whole sweep.
pub fn sweep(base: &RunInput, scales: &[f64], tolerance: f64) -> Result<Vec<SweepResult>, FilterError> {
    base.validate()?;
    if let Some(bad) = scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(FilterError::InvalidInput(format!(
            "sweep scales must be positive, got {bad}"
        )));
    }

    let candidates: Vec<(f64, f64)> = scales
        .iter()
        .flat_map(|q| scales.iter().map(move |r| (*q, *r)))
        .collect();
    info!(candidates = candidates.len(), "starting tuning sweep");

    candidates
        .into_par_iter()
        .map(|(q_scale, r_scale)| -> Result<SweepResult, FilterError> {
            let mut input = base.clone();
            input.filter.q_diag.iter_mut().for_each(|q| *q *= q_scale);
            input.filter.r_diag.iter_mut().for_each(|r| *r *= r_scale);

            let output = run_filter(&input)?;
            let verdict = output.consistency(input.meas_dim).verdict(tolerance);
            Ok(SweepResult {
                q_scale,
                r_scale,
                nis_avg: output.nis_avg,
                nis_max: output.nis_max,
                failed_at_step: output.failed_at_step,
                verdict,
            })
        })
        .collect()
}

/// The completed candidate whose mean NIS sits closest to `dof`.
pub fn best_candidate(results: &[SweepResult], dof: usize) -> Option<&SweepResult> {
    results
        .iter()
        .filter(|r| r.mismatch(dof).is_finite())
        .min_by(|a, b| a.mismatch(dof).total_cmp(&b.mismatch(dof)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::SimulationRng;
    use crate::sensors::NoisySensor;
    use nebula_core::estimation::run::FilterConfig;
    use nebula_core::models::estimation::dynamics::ProcessKind;
    use rand_distr::{Distribution, Normal};

    const Q: [f64; 2] = [1e-4, 1e-6];
    const R: [f64; 2] = [4e-4, 1e-6];

    /// Random-walk truth read through a sensor whose noise matches `R`.
    fn matched_run() -> RunInput {
        let mut rng = SimulationRng::new(Some(42));
        let steps: Vec<Normal<f64>> = Q.iter().map(|q| Normal::new(0.0, q.sqrt()).unwrap()).collect();
        let sensor = NoisySensor::new(&[R[0].sqrt(), R[1].sqrt()]).unwrap();

        let mut x = vec![400.0, 7.67];
        let mut measurements = Vec::new();
        for k in 0..600 {
            if k > 0 {
                for (xi, w) in x.iter_mut().zip(&steps) {
                    *xi += w.sample(&mut rng.0);
                }
            }
            measurements.push(sensor.measure(&x, &mut rng));
        }

        RunInput {
            state_dim: 2,
            meas_dim: 2,
            process_kind: ProcessKind::Constant,
            time: (0..600).map(|k| k as f64).collect(),
            filter: FilterConfig {
                q_diag: Q.to_vec(),
                r_diag: R.to_vec(),
                x0: measurements[0].clone(),
                p0_diag: R.to_vec(),
                kappa: 1.0,
            },
            measurements,
            truth: None,
        }
    }

    #[test]
    fn sweep_covers_the_grid_in_order() {
        let base = matched_run();
        let results = sweep(&base, &[0.1, 1.0, 10.0], 3.0).unwrap();

        assert_eq!(results.len(), 9);
        assert_eq!((results[0].q_scale, results[0].r_scale), (0.1, 0.1));
        assert_eq!((results[5].q_scale, results[5].r_scale), (1.0, 10.0));
        assert!(results.iter().all(|r| r.failed_at_step.is_none()));
    }

    #[test]
    fn sweep_flags_mistuned_noise() {
        let base = matched_run();
        let results = sweep(&base, &[0.01, 1.0, 100.0], 3.0).unwrap();
        let at = |q: f64, r: f64| {
            results
                .iter()
                .find(|c| c.q_scale == q && c.r_scale == r)
                .unwrap()
        };

        assert_eq!(at(1.0, 0.01).verdict, ConsistencyVerdict::Overconfident);
        assert_eq!(at(1.0, 100.0).verdict, ConsistencyVerdict::Underconfident);

        let best = best_candidate(&results, 2).unwrap();
        assert_eq!((best.q_scale, best.r_scale), (1.0, 1.0));
        assert_eq!(best.verdict, ConsistencyVerdict::Consistent);
    }

    #[test]
    fn sweep_is_deterministic() {
        let base = matched_run();
        assert_eq!(
            sweep(&base, &[0.5, 2.0], 3.0).unwrap(),
            sweep(&base, &[0.5, 2.0], 3.0).unwrap()
        );
    }

    #[test]
    fn bad_scales_are_rejected() {
        let base = matched_run();
        assert!(matches!(
            sweep(&base, &[1.0, 0.0], 3.0),
            Err(FilterError::InvalidInput(_))
        ));
    }
}
