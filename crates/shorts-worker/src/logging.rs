//! Structured run logging.
//!
//! Every event carries the run id, and stage events also carry the stage
//! name, so a run can be followed through JSON logs.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info, warn, Span};

use shorts_models::{RunId, Stage};

/// Run logger with consistent fields.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    topic: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId, topic: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            topic: topic.to_string(),
        }
    }

    pub fn log_start(&self) {
        info!(run_id = %self.run_id, topic = %self.topic, "Run started");
    }

    pub fn log_stage_start(&self, stage: Stage) {
        info!(
            run_id = %self.run_id,
            stage = %stage,
            "[{}/{}] {}",
            stage.position(),
            Stage::ORDER.len(),
            stage.label()
        );
    }

    pub fn log_stage_complete(&self, stage: Stage, elapsed: Duration, detail: &str) {
        info!(
            run_id = %self.run_id,
            stage = %stage,
            elapsed_secs = elapsed.as_secs_f64(),
            "Stage complete: {}", detail
        );
    }

    pub fn log_stage_skipped(&self, stage: Stage, reason: &str) {
        info!(run_id = %self.run_id, stage = %stage, "Stage skipped: {}", reason);
    }

    pub fn log_stage_failed(&self, stage: Stage, code: &str, message: &str) {
        error!(
            run_id = %self.run_id,
            stage = %stage,
            code,
            "Stage failed: {}", message
        );
    }

    pub fn log_completion(&self, output: &Path, elapsed: Duration) {
        info!(
            run_id = %self.run_id,
            output = %output.display(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Run completed"
        );
    }

    /// Failed runs keep their workspace; say where it is.
    pub fn log_workspace_preserved(&self, workspace: &Path) {
        warn!(
            run_id = %self.run_id,
            workspace = %workspace.display(),
            "Run failed; intermediate files preserved for inspection"
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}
