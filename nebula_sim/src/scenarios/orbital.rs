// nebula_sim/src/scenarios/orbital.rs

//! Two-body truth for a satellite in low Earth orbit, reported as altitude
//! (km) and speed (km/s).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Earth's gravitational parameter, m^3/s^2.
pub const MU_EARTH: f64 = 3.986004418e14;
/// Earth's equatorial radius, m.
pub const R_EARTH: f64 = 6378137.0;

const PERIGEE_ELLIPTIC_M: f64 = 6771.0e3;
const APOGEE_ELLIPTIC_M: f64 = 7371.0e3;
const HOHMANN_R1_M: f64 = 6771.0e3;
const HOHMANN_R2_M: f64 = 7071.0e3;

/// Initial orbit presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbitPreset {
    /// Circular orbit at the configured radius.
    #[default]
    Circular,
    /// 400 x 1000 km ellipse, starting at perigee.
    Elliptic,
    /// The transfer ellipse between 6771 km and 7071 km radius, at perigee.
    Hohmann,
    /// The configured radius and speed as given.
    Custom,
}

impl OrbitPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrbitPreset::Circular => "circular",
            OrbitPreset::Elliptic => "elliptic",
            OrbitPreset::Hohmann => "hohmann",
            OrbitPreset::Custom => "custom",
        }
    }

    /// Position and velocity (m, m/s) at `t = 0`, in the orbital plane.
    pub fn initial_conditions(&self, r0_km: f64, v0_kms: f64) -> (Vector3<f64>, Vector3<f64>) {
        let (r, v) = match self {
            OrbitPreset::Circular => {
                let r = r0_km * 1e3;
                (r, (MU_EARTH / r).sqrt())
            }
            OrbitPreset::Elliptic => (
                PERIGEE_ELLIPTIC_M,
                vis_viva(PERIGEE_ELLIPTIC_M, APOGEE_ELLIPTIC_M),
            ),
            OrbitPreset::Hohmann => (HOHMANN_R1_M, vis_viva(HOHMANN_R1_M, HOHMANN_R2_M)),
            OrbitPreset::Custom => (r0_km * 1e3, v0_kms * 1e3),
        };
        (Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v, 0.0))
    }
}

/// Perigee speed of the ellipse with the given perigee and apogee radii.
fn vis_viva(rp: f64, ra: f64) -> f64 {
    let a = 0.5 * (rp + ra);
    (MU_EARTH * (2.0 / rp - 1.0 / a)).sqrt()
}

/// One semi-implicit Euler step of point-mass gravity.
pub fn twobody_step(r: &Vector3<f64>, v: &Vector3<f64>, dt: f64) -> (Vector3<f64>, Vector3<f64>) {
    let accel = -MU_EARTH * r / r.norm().powi(3);
    let v_next = v + accel * dt;
    let r_next = r + v_next * dt;
    (r_next, v_next)
}

/// Samples `[altitude_km, speed_kms]` at every grid time, stepping the orbit
/// by `dt` between samples.
pub fn leo_truth(n_samples: usize, dt: f64, r0: Vector3<f64>, v0: Vector3<f64>) -> Vec<Vec<f64>> {
    let (mut r, mut v) = (r0, v0);
    let mut states = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        states.push(vec![(r.norm() - R_EARTH) / 1e3, v.norm() / 1e3]);
        (r, v) = twobody_step(&r, &v, dt);
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn circular_orbit_keeps_altitude_and_speed() {
        let (r0, v0) = OrbitPreset::Circular.initial_conditions(6771.0, 0.0);
        let states = leo_truth(601, 1.0, r0, v0);

        assert_abs_diff_eq!(states[0][0], 392.863, epsilon = 1e-3);
        assert_abs_diff_eq!(states[0][1], 7.6726, epsilon = 1e-3);
        // Semi-implicit Euler wobbles by a few km over ten minutes.
        for s in &states {
            assert_abs_diff_eq!(s[0], states[0][0], epsilon = 5.0);
            assert_abs_diff_eq!(s[1], states[0][1], epsilon = 5e-3);
        }
    }

    #[test]
    fn elliptic_orbit_climbs_from_perigee() {
        let (r0, v0) = OrbitPreset::Elliptic.initial_conditions(0.0, 0.0);
        assert_abs_diff_eq!(r0.x, 6771.0e3);
        let states = leo_truth(1200, 1.0, r0, v0);
        let last = states.last().unwrap();
        assert!(last[0] > states[0][0] + 50.0);
        // Speed drops as the satellite climbs.
        assert!(last[1] < states[0][1]);
    }

    #[test]
    fn hohmann_perigee_is_faster_than_circular() {
        let (_, v_circ) = OrbitPreset::Circular.initial_conditions(6771.0, 0.0);
        let (_, v_transfer) = OrbitPreset::Hohmann.initial_conditions(6771.0, 0.0);
        assert!(v_transfer.y > v_circ.y);
    }

    #[test]
    fn custom_uses_given_state() {
        let (r0, v0) = OrbitPreset::Custom.initial_conditions(7000.0, 7.5);
        assert_eq!(r0, Vector3::new(7.0e6, 0.0, 0.0));
        assert_eq!(v0, Vector3::new(0.0, 7500.0, 0.0));
    }
}
