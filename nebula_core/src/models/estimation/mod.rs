// nebula_core/src/models/estimation/mod.rs

//! The process and measurement models a state estimator is built from.

pub mod dynamics;
pub mod measurement;
