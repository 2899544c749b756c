// nebula_core/src/models/mod.rs

pub mod estimation;
