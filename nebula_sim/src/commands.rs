// nebula_sim/src/commands.rs

//! What each `nebula` subcommand does, kept apart from argument parsing so
//! the pipelines can be driven from tests.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use nebula_core::error::FilterError;
use nebula_core::estimation::run::RunInput;

use crate::config::{load_config, ConfigError, SimulationConfig};
use crate::prng::SimulationRng;
use crate::runlog::{CsvRunLog, RunMetadata};
use crate::scenarios::{synthesize, SyntheticRun};
use crate::service::{assimilate, AssimilateResponse, ServiceError, SessionContext};
use crate::sweep::{best_candidate, sweep, SweepResult};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `value` as pretty JSON to `out`, or to stdout.
pub fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<(), CommandError> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            info!("Wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

pub fn read_run_input(path: &Path) -> Result<RunInput, CommandError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Generates the synthetic record a configuration describes.
pub fn simulate(config: &SimulationConfig) -> Result<SyntheticRun, CommandError> {
    let mut rng = SimulationRng::new(config.simulation.seed);
    Ok(synthesize(config, &mut rng)?)
}

/// Builds the per-request context for a scenario run.
pub fn session_for(config: &SimulationConfig) -> SessionContext {
    let scenario = &config.simulation.scenario;
    let ctx = SessionContext::new(RunMetadata {
        scenario: scenario.name().to_string(),
        preset: scenario.preset().map(str::to_string),
    });
    if config.log.enabled {
        ctx.with_run_log(Arc::new(CsvRunLog::new(&config.log.run_log)))
    } else {
        ctx
    }
}

/// Simulates and filters one scenario.
pub fn run_scenario(config: &SimulationConfig) -> Result<AssimilateResponse, CommandError> {
    let run = simulate(config)?;
    let response = assimilate(&run.input, &session_for(config))?;
    report(&run, &response);
    Ok(response)
}

fn report(run: &SyntheticRun, response: &AssimilateResponse) {
    let output = &response.output;
    info!(
        "Scenario '{}' ({} samples): nis_avg = {:.3}, nis_max = {:.3}, verdict = {:?}",
        run.scenario.name(),
        response.n,
        output.nis_avg,
        output.nis_max,
        response.verdict
    );
    if let Some(nees) = output.nees.as_ref().filter(|v| !v.is_empty()) {
        let finite: Vec<f64> = nees.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.len() < nees.len() {
            warn!("{} NEES samples were not finite", nees.len() - finite.len());
        }
        if !finite.is_empty() {
            info!(
                "True NEES against the synthetic truth: avg = {:.3}",
                finite.iter().sum::<f64>() / finite.len() as f64
            );
        }
    }
    if let (Some(x), Some(p)) = (output.x_est.last(), output.p_diag.last()) {
        let channels = run.scenario.channels();
        for ((name, value), var) in channels.iter().zip(x).zip(p) {
            info!("  final {name}: {value:.4} +/- {:.4}", var.sqrt());
        }
    }
}

/// Runs the tuning sweep for a scenario and reports the best candidate.
pub fn sweep_scenario(
    config: &SimulationConfig,
    scales: &[f64],
    tolerance: f64,
) -> Result<Vec<SweepResult>, CommandError> {
    let run = simulate(config)?;
    let results = sweep(&run.input, scales, tolerance)?;

    for r in &results {
        info!(
            "q x{:<6} r x{:<6} nis_avg = {:>10.3} nis_max = {:>10.3} {:?}{}",
            r.q_scale,
            r.r_scale,
            r.nis_avg,
            r.nis_max,
            r.verdict,
            r.failed_at_step
                .map(|k| format!(" (failed at step {k})"))
                .unwrap_or_default()
        );
    }
    match best_candidate(&results, run.input.meas_dim) {
        Some(best) => info!(
            "Best tuning: Q x{}, R x{} (nis_avg = {:.3})",
            best.q_scale, best.r_scale, best.nis_avg
        ),
        None => warn!("No candidate tuning completed"),
    }
    Ok(results)
}

/// Loads a configuration from disk.
pub fn load(path: &Path) -> Result<SimulationConfig, CommandError> {
    Ok(load_config(path)?)
}
