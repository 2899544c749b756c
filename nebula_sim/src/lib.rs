// nebula_sim/src/lib.rs

//! The run harness around `nebula_core`: scenario configuration, synthetic
//! truth and sensors, the run log, a request/response service layer, tuning
//! sweeps and the `nebula` command line.

// This prelude is for convenience for other crates and binaries.
pub mod prelude;

pub mod cli;
pub mod commands;
pub mod config;
pub mod prng;
pub mod runlog;
pub mod scenarios;
pub mod sensors;
pub mod service;
pub mod sweep;
