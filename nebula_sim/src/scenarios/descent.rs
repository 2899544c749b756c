// nebula_sim/src/scenarios/descent.rs

//! Powered-off descent truth: a steady sink with a slow oscillation on top.
//! Reported as altitude (m) and vertical rate (m/s, positive up), so the
//! rate channel integrates into the altitude channel.

use std::f64::consts::PI;

/// Steady sink rate, m/s.
const SINK_RATE: f64 = 0.5;
const OSCILLATION_AMPLITUDE_M: f64 = 5.0;
const OSCILLATION_FREQ_HZ: f64 = 0.05;

pub fn altitude(t: f64, alt0_m: f64) -> f64 {
    alt0_m - SINK_RATE * t + OSCILLATION_AMPLITUDE_M * (2.0 * PI * OSCILLATION_FREQ_HZ * t).sin()
}

/// Samples `[altitude_m, vertical_rate_mps]` on the time grid.
///
/// The rate is the numerical derivative of the sampled altitude: central
/// differences inside the grid, one-sided at the ends.
pub fn descent_truth(time: &[f64], alt0_m: f64) -> Vec<Vec<f64>> {
    let alts: Vec<f64> = time.iter().map(|t| altitude(*t, alt0_m)).collect();
    let rates = gradient(&alts, time);
    alts.into_iter().zip(rates).map(|(a, r)| vec![a, r]).collect()
}

fn gradient(values: &[f64], time: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let slope = |i: usize, j: usize| {
        let span = time[j] - time[i];
        if span > 0.0 {
            (values[j] - values[i]) / span
        } else {
            0.0
        }
    };
    (0..n)
        .map(|k| match k {
            0 => slope(0, 1),
            k if k == n - 1 => slope(n - 2, n - 1),
            k => slope(k - 1, k + 1),
        })
        .collect()
}
