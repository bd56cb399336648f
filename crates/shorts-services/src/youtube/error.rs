//! Upload error types.

use serde::Deserialize;
use thiserror::Error;

use crate::error::truncate_body;
use crate::retry::Retryable;

pub type YoutubeResult<T> = Result<T, UploadError>;

/// 403 reasons that mean the account ran out of quota.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "uploadLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

/// Upload failures, each with a stable [`UploadError::code`].
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("YouTube client credentials missing: {0}")]
    MissingCredentials(String),

    #[error("YouTube credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("YouTube quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Network error talking to YouTube: {0}")]
    Network(String),

    #[error("YouTube service unavailable: {0}")]
    Unavailable(String),

    #[error("YouTube rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Video file not uploadable: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::MissingCredentials(_) => "missing_credentials",
            UploadError::InvalidCredentials(_) => "invalid_credentials",
            UploadError::QuotaExceeded(_) => "quota_exceeded",
            UploadError::Network(_) => "network",
            UploadError::Unavailable(_) => "unavailable",
            UploadError::Rejected { .. } => "rejected",
            UploadError::InvalidVideo(_) => "invalid_video",
            UploadError::Io(_) => "io",
        }
    }

    /// Classify an error response from the Data API or the OAuth endpoints.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = GoogleError::parse(body);
        let message = detail
            .as_ref()
            .map(|d| d.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| truncate_body(body));
        let is_quota = detail
            .as_ref()
            .is_some_and(|d| d.reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())));

        match status.as_u16() {
            401 => UploadError::InvalidCredentials(message),
            403 | 429 if is_quota || status.as_u16() == 429 => UploadError::QuotaExceeded(message),
            code @ 500..=599 => UploadError::Unavailable(format!("status {}: {}", code, message)),
            code => UploadError::Rejected {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::Network(e.to_string())
    }
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Unavailable(_) | UploadError::Network(_))
    }
}

/// Relevant parts of a Google error body.
#[derive(Debug, Default)]
struct GoogleError {
    message: String,
    reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    // Data API: {"error": {"code": 403, "message": "...", "errors": [{"reason": "..."}]}}
    Api {
        #[serde(default)]
        message: String,
        #[serde(default)]
        errors: Vec<ErrorItem>,
    },
    // OAuth: {"error": "invalid_grant", "error_description": "..."}
    OAuth(String),
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

impl GoogleError {
    fn parse(body: &str) -> Option<Self> {
        let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
        Some(match envelope.error {
            ErrorBody::Api { message, errors } => GoogleError {
                message,
                reasons: errors.into_iter().map(|e| e.reason).collect(),
            },
            ErrorBody::OAuth(code) => GoogleError {
                message: match envelope.error_description {
                    Some(desc) => format!("{}: {}", code, desc),
                    None => code.clone(),
                },
                reasons: vec![code],
            },
        })
    }
}

/// Whether an OAuth error body carries `invalid_grant`.
pub(crate) fn is_invalid_grant(body: &str) -> bool {
    GoogleError::parse(body).is_some_and(|e| e.reasons.iter().any(|r| r == "invalid_grant"))
}
