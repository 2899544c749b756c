// nebula_core/src/lib.rs

//! Sequential state estimation for noisy telemetry.
//!
//! The crate provides an unscented Kalman filter over pluggable process and
//! measurement models, the consistency diagnostics that go with it, and a
//! record-driven runner that turns a measurement series into a filtered
//! estimate series.

pub mod error;
pub mod estimation;
pub mod models;
pub mod prelude;
pub mod state;
pub mod types;
