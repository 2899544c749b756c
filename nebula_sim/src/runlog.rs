// nebula_sim/src/runlog.rs

//! An append-only record of filter runs, one CSV row per run.
//!
//! Logging is best effort: a run never fails because its log row could not
//! be written.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use nebula_core::estimation::run::{delta_times, RunInput, RunOutput};

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("run log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("run log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Labels a run for the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub scenario: String,
    pub preset: Option<String>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            scenario: "custom".to_string(),
            preset: None,
        }
    }
}

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub timestamp: String,
    pub scenario: String,
    pub preset: String,
    pub process_kind: String,
    pub duration_s: f64,
    pub dt_s: f64,
    /// `Q` diagonal, `;`-separated.
    pub q_diag: String,
    pub r_diag: String,
    pub nis_avg: f64,
    pub nis_max: f64,
    pub n_points: usize,
    pub failed_at_step: Option<usize>,
}

impl RunLogEntry {
    pub fn from_run(meta: &RunMetadata, input: &RunInput, output: &RunOutput) -> Self {
        let dts = delta_times(&input.time);
        let dt_s = if dts.is_empty() {
            0.0
        } else {
            dts.iter().sum::<f64>() / dts.len() as f64
        };
        let duration_s = match (input.time.first(), input.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };

        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            scenario: meta.scenario.clone(),
            preset: meta.preset.clone().unwrap_or_else(|| "custom".to_string()),
            process_kind: input.process_kind.as_str().to_string(),
            duration_s,
            dt_s,
            q_diag: join_values(&input.filter.q_diag),
            r_diag: join_values(&input.filter.r_diag),
            nis_avg: output.nis_avg,
            nis_max: output.nis_max,
            n_points: input.len(),
            failed_at_step: output.failed_at_step,
        }
    }
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Where run rows go.
pub trait RunLogSink: Send + Sync {
    fn append_run(&self, entry: &RunLogEntry) -> Result<(), RunLogError>;
}

/// Appends rows to a CSV file, writing the header when the file is new.
#[derive(Debug)]
pub struct CsvRunLog {
    path: PathBuf,
    // Serializes appends from concurrent runs in this process.
    write_lock: Mutex<()>,
}

impl CsvRunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLogSink for CsvRunLog {
    fn append_run(&self, entry: &RunLogEntry) -> Result<(), RunLogError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;

        debug!(path = %self.path.display(), "appended run log row");
        Ok(())
    }
}

/// Reads every row of a CSV run log.
pub fn read_runs(path: &Path) -> Result<Vec<RunLogEntry>, RunLogError> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<Result<Vec<RunLogEntry>, csv::Error>>()
        .map_err(RunLogError::from)
}

/// Appends `entry`, logging and discarding any failure.
pub fn log_run_best_effort(sink: &dyn RunLogSink, entry: &RunLogEntry) {
    if let Err(e) = sink.append_run(entry) {
        warn!("Failed to append run log row: {}", e);
    }
}
