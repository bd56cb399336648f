//! Pipeline error types.

use thiserror::Error;

use shorts_media::MediaError;
use shorts_models::Stage;
use shorts_services::{ServiceError, UploadError};

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type StageResult<T> = Result<T, StageError>;

/// Coarse failure class, used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid settings, missing tools, bad caller input
    Configuration,
    /// An external service or tool failed
    Service,
    /// An artifact failed validation
    Integrity,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Service => "service",
            ErrorKind::Integrity => "integrity",
        }
    }
}

/// Failure inside one stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Service(ServiceError::Config(_)) => ErrorKind::Configuration,
            StageError::Service(_) => ErrorKind::Service,
            StageError::Upload(UploadError::MissingCredentials(_)) => ErrorKind::Configuration,
            StageError::Upload(UploadError::InvalidVideo(_) | UploadError::Io(_)) => {
                ErrorKind::Integrity
            }
            StageError::Upload(_) => ErrorKind::Service,
            StageError::Media(e) if e.is_missing_tool() => ErrorKind::Configuration,
            StageError::Media(e) if e.is_integrity() => ErrorKind::Integrity,
            StageError::Media(_) => ErrorKind::Service,
            StageError::Integrity(_) | StageError::Io(_) => ErrorKind::Integrity,
        }
    }

    /// Short machine-readable code. Upload failures use [`UploadError::code`].
    pub fn code(&self) -> &'static str {
        match self {
            StageError::Upload(e) => e.code(),
            other => other.kind().as_str(),
        }
    }
}

/// Top-level failure of a run or of startup.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Config(Vec<String>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Run workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(vec![msg.into()])
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn stage(stage: Stage, source: impl Into<StageError>) -> Self {
        Self::Stage {
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_)
            | PipelineError::InvalidInput(_)
            | PipelineError::Workspace(_) => ErrorKind::Configuration,
            PipelineError::Stage { source, .. } => source.kind(),
        }
    }

    /// Stage that failed, if the run got that far.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Stage { source, .. } => source.code(),
            other => other.kind().as_str(),
        }
    }

    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        if self.failed_stage() == Some(Stage::Upload) {
            return 5;
        }
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Service => 3,
            ErrorKind::Integrity => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(PipelineError::Config(vec!["x".into()]).exit_code(), 2);

        let service = PipelineError::stage(Stage::Voice, ServiceError::Unavailable("down".into()));
        assert_eq!(service.kind(), ErrorKind::Service);
        assert_eq!(service.exit_code(), 3);

        let integrity = PipelineError::stage(Stage::Images, StageError::integrity("no images"));
        assert_eq!(integrity.exit_code(), 4);

        let quota = PipelineError::stage(Stage::Upload, UploadError::QuotaExceeded("q".into()));
        assert_eq!(quota.exit_code(), 5);
        assert_eq!(quota.code(), "quota_exceeded");
        assert_eq!(quota.failed_stage(), Some(Stage::Upload));
    }

    #[test]
    fn test_media_error_kinds() {
        assert_eq!(
            StageError::from(MediaError::FfmpegNotFound).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            StageError::from(MediaError::invalid_media("zero frames")).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            StageError::from(MediaError::Timeout(10)).kind(),
            ErrorKind::Service
        );
    }

    #[test]
    fn test_config_error_lists_every_problem() {
        let err = PipelineError::Config(vec!["A is not set".into(), "B is invalid".into()]);
        let text = err.to_string();
        assert!(text.contains("A is not set"));
        assert!(text.contains("B is invalid"));
    }
}
