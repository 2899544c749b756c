// nebula_sim/src/service.rs

//! Transport-free request/response layer around the filter engine.
//!
//! A front end (CLI, HTTP handler, test) builds a `SessionContext` per
//! request and calls `assimilate`. Errors carry a status code in the HTTP
//! sense so any transport can map them directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use nebula_core::error::FilterError;
use nebula_core::estimation::consistency::ConsistencyVerdict;
use nebula_core::estimation::run::{run_filter, RunInput, RunOutput};

use crate::runlog::{log_run_best_effort, RunLogEntry, RunLogSink, RunMetadata};

/// Band around the measurement dimension used to label the mean NIS.
pub const DEFAULT_NIS_TOLERANCE: f64 = 3.0;

/// Per-request collaborators and labels.
#[derive(Clone, Default)]
pub struct SessionContext {
    pub run_log: Option<Arc<dyn RunLogSink>>,
    pub metadata: RunMetadata,
}

impl SessionContext {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            run_log: None,
            metadata,
        }
    }

    pub fn with_run_log(mut self, sink: Arc<dyn RunLogSink>) -> Self {
        self.run_log = Some(sink);
        self
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("run_log", &self.run_log.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

pub type AssimilateRequest = RunInput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssimilateResponse {
    #[serde(flatten)]
    pub output: RunOutput,
    /// Number of input samples.
    pub n: usize,
    pub verdict: ConsistencyVerdict,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed; nothing was run.
    #[error("bad request: {0}")]
    BadRequest(FilterError),
    /// The filter diverged part-way. `partial` holds the completed steps.
    #[error("processing failed: {source}")]
    Processing {
        source: FilterError,
        step: usize,
        partial: Box<RunOutput>,
    },
}

/// The error body a transport sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub kind: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at_step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<RunOutput>,
}

impl ServiceError {
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Processing { .. } => 500,
        }
    }

    pub fn filter_error(&self) -> &FilterError {
        match self {
            ServiceError::BadRequest(e) => e,
            ServiceError::Processing { source, .. } => source,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let (failed_at_step, partial) = match self {
            ServiceError::BadRequest(_) => (None, None),
            ServiceError::Processing { step, partial, .. } => {
                (Some(*step), Some(partial.as_ref().clone()))
            }
        };
        ErrorBody {
            status: self.status(),
            kind: self.filter_error().kind().to_string(),
            error: self.filter_error().to_string(),
            failed_at_step,
            partial,
        }
    }
}

/// Runs the filter over `request` and logs the run.
///
/// Failed runs are logged too, with their failing step.
pub fn assimilate(
    request: &AssimilateRequest,
    ctx: &SessionContext,
) -> Result<AssimilateResponse, ServiceError> {
    let output = run_filter(request).map_err(|err| match err {
        FilterError::InvalidInput(_) => ServiceError::BadRequest(err),
        other => ServiceError::Processing {
            step: other.step().unwrap_or(0),
            source: other,
            partial: Box::default(),
        },
    })?;

    if let Some(sink) = &ctx.run_log {
        let entry = RunLogEntry::from_run(&ctx.metadata, request, &output);
        log_run_best_effort(sink.as_ref(), &entry);
    }

    if let Some(source) = output.failure.clone() {
        return Err(ServiceError::Processing {
            step: output.failed_at_step.unwrap_or(output.len()),
            source,
            partial: Box::new(output),
        });
    }

    let verdict = output
        .consistency(request.meas_dim)
        .verdict(DEFAULT_NIS_TOLERANCE);
    info!(
        scenario = %ctx.metadata.scenario,
        n = request.len(),
        nis_avg = output.nis_avg,
        nis_max = output.nis_max,
        ?verdict,
        "assimilation complete"
    );

    Ok(AssimilateResponse {
        output,
        n: request.len(),
        verdict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::RunLogError;
    use nebula_core::estimation::run::FilterConfig;
    use nebula_core::models::estimation::dynamics::ProcessKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryLog(Mutex<Vec<RunLogEntry>>);

    impl RunLogSink for MemoryLog {
        fn append_run(&self, entry: &RunLogEntry) -> Result<(), RunLogError> {
            self.0.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    struct BrokenLog;

    impl RunLogSink for BrokenLog {
        fn append_run(&self, _entry: &RunLogEntry) -> Result<(), RunLogError> {
            Err(RunLogError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    fn request(n: usize) -> AssimilateRequest {
        RunInput {
            state_dim: 2,
            meas_dim: 2,
            process_kind: ProcessKind::Constant,
            time: (0..n).map(|k| k as f64).collect(),
            measurements: (0..n)
                .map(|k| vec![400.0 + 0.01 * (k % 3) as f64, 7.67])
                .collect(),
            filter: FilterConfig {
                q_diag: vec![1e-4, 1e-5],
                r_diag: vec![1e-4, 1e-6],
                x0: vec![400.0, 7.67],
                p0_diag: vec![1.0, 0.1],
                kappa: 1.0,
            },
            truth: None,
        }
    }

    #[test]
    fn successful_run_is_logged() {
        let log = Arc::new(MemoryLog::default());
        let ctx = SessionContext::new(RunMetadata {
            scenario: "leo_sat".into(),
            preset: Some("circular".into()),
        })
        .with_run_log(log.clone());

        let response = assimilate(&request(50), &ctx).unwrap();
        assert_eq!(response.n, 50);
        assert_eq!(response.output.x_est.len(), 50);

        let rows = log.0.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].preset, "circular");
        assert_eq!(rows[0].n_points, 50);
    }

    #[test]
    fn invalid_request_is_a_client_error() {
        let mut bad = request(10);
        bad.measurements.pop();
        let log = Arc::new(MemoryLog::default());
        let ctx = SessionContext::default().with_run_log(log.clone());

        let err = assimilate(&bad, &ctx).unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_body().kind, "invalid_input");
        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn numerical_failure_is_a_server_error_with_partial_output() {
        let mut diverging = request(10);
        diverging.filter.p0_diag = vec![-1.0, 0.1];
        let log = Arc::new(MemoryLog::default());
        let ctx = SessionContext::default().with_run_log(log.clone());

        let err = assimilate(&diverging, &ctx).unwrap_err();
        assert_eq!(err.status(), 500);
        let body = err.to_body();
        assert_eq!(body.kind, "numerical_instability");
        assert_eq!(body.failed_at_step, Some(0));
        assert_eq!(body.partial.map(|p| p.len()), Some(0));

        let rows = log.0.lock().unwrap();
        assert_eq!(rows[0].failed_at_step, Some(0));
    }

    #[test]
    fn broken_log_does_not_fail_the_run() {
        let ctx = SessionContext::default().with_run_log(Arc::new(BrokenLog));
        assert!(assimilate(&request(5), &ctx).is_ok());
    }

    #[test]
    fn wire_format_uses_record_field_names() {
        let json = serde_json::to_value(request(2)).unwrap();
        for key in ["state_dim", "process_kind", "Q_diag", "R_diag", "P0_diag", "x0", "kappa"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("truth").is_none());

        let parsed: AssimilateRequest = serde_json::from_value(serde_json::json!({
            "state_dim": 1, "meas_dim": 1, "process_kind": "constant",
            "time": [0.0, 1.0], "measurements": [[1.0], [1.1]],
            "Q_diag": [0.01], "R_diag": [0.1], "x0": [1.0], "P0_diag": [1.0]
        }))
        .unwrap();
        assert_eq!(parsed.filter.kappa, 1.0);

        let response = assimilate(&parsed, &SessionContext::default()).unwrap();
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("P_diag").is_some());
        assert_eq!(body["failed_at_step"], serde_json::Value::Null);
        assert_eq!(body["n"], 2);
    }
}
