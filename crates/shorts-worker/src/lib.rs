//! Topic-to-short-video pipeline.
//!
//! This crate provides:
//! - The six pipeline stages (script, images, voice, video, subtitles, upload)
//! - The run orchestrator and its report
//! - Environment-driven configuration
//! - Per-run workspace, structured logging and metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod stages;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, PipelineResult, StageError, StageResult};
pub use logging::RunLogger;
pub use media::{FfmpegToolkit, MediaToolkit};
pub use pipeline::{Pipeline, RunReport, Services, StageTiming};
pub use workspace::RunWorkspace;
