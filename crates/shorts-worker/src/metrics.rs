//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; an embedding process decides
//! whether and where they are exported.

use metrics::{counter, histogram};

use shorts_models::Stage;

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_DURATION_SECONDS: &str = "shorts_stage_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "shorts_stage_failures_total";
    pub const IMAGES_REJECTED_TOTAL: &str = "shorts_images_rejected_total";
    pub const RUNS_TOTAL: &str = "shorts_runs_total";
}

/// Record the wall time of one stage.
pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a stage failure.
pub fn record_stage_failure(stage: Stage) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
}

/// Record an image candidate rejected by the image stage.
pub fn record_image_rejected(reason: &'static str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::IMAGES_REJECTED_TOTAL, &labels).increment(1);
}

/// Record a finished run (`success` or `failure`).
pub fn record_run(outcome: &'static str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
}
