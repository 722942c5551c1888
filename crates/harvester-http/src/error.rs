use harvester_params::LookupError;
use harvester_scheduler::CallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection, timeout or body read failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Body(String),
}

impl HttpError {
    /// Transient failures the caller could retry later.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Request(e) => e.is_timeout() || e.is_connect(),
            HttpError::Status { status, .. } => *status == 429 || *status >= 500,
            HttpError::Body(_) => false,
        }
    }
}

impl From<HttpError> for CallError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Request(e) => CallError::Request(e.to_string()),
            HttpError::Status { status, body } => CallError::Status { status, body },
            HttpError::Body(msg) => CallError::Other(msg),
        }
    }
}

impl From<HttpError> for LookupError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Body(msg) => LookupError::Payload(msg),
            other => LookupError::Unavailable(other.to_string()),
        }
    }
}
