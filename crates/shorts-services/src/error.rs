//! Service client error types.

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Quota or rate limit exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Transient failures worth retrying inside a client.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Unavailable(_) => true,
            ServiceError::RequestFailed { status, .. } => *status >= 500,
            ServiceError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let body = truncate_body(body);
        match status.as_u16() {
            401 | 403 => ServiceError::Auth(format!("{} returned {}: {}", service, status, body)),
            429 => ServiceError::QuotaExceeded(format!("{} returned {}: {}", service, status, body)),
            503 => ServiceError::Unavailable(format!("{} returned {}: {}", service, status, body)),
            code => ServiceError::RequestFailed { status: code, body },
        }
    }

    /// Map a transport failure, treating refused connections as an unavailable service.
    pub fn from_transport(service: &str, error: reqwest::Error) -> Self {
        if error.is_connect() {
            ServiceError::Unavailable(format!("cannot connect to {}: {}", service, error))
        } else {
            ServiceError::Network(error)
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ServiceError::InvalidResponse(message.into())
    }
}

/// Check a response status, turning failures into a [`ServiceError`].
pub(crate) async fn check_status(
    service: &str,
    response: reqwest::Response,
) -> ServiceResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::from_status(service, status, &body))
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
