//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output duration {actual:.3}s deviates from target {expected:.3}s (tolerance {tolerance:.3}s)")]
    DurationMismatch {
        expected: f64,
        actual: f64,
        tolerance: f64,
    },

    #[error("Audio format mismatch: {0}")]
    AudioFormatMismatch(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the failure means a required tool is missing from the host.
    pub fn is_missing_tool(&self) -> bool {
        matches!(self, Self::FfmpegNotFound | Self::FfprobeNotFound)
    }

    /// Whether the failure concerns the produced or consumed artifact itself
    /// rather than the tool run.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_)
                | Self::EmptyFile(_)
                | Self::InvalidMedia(_)
                | Self::DurationMismatch { .. }
                | Self::AudioFormatMismatch(_)
                | Self::Wav(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MediaError::FfmpegNotFound.is_missing_tool());
        assert!(MediaError::EmptyFile(PathBuf::from("a.wav")).is_integrity());
        assert!(!MediaError::ffmpeg_failed("boom", None, Some(1)).is_integrity());
    }

    #[test]
    fn test_duration_mismatch_message() {
        let err = MediaError::DurationMismatch {
            expected: 30.0,
            actual: 28.5,
            tolerance: 0.092,
        };
        assert!(err.to_string().contains("28.500s"));
    }
}
