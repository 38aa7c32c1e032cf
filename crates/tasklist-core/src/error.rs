//! Error types
//!
//! `ServiceError` covers everything that can go wrong talking to the remote
//! task service. `StoreError` adds the failures the store detects locally,
//! before any remote call is made.
//!
//! The store never lets these escape an operation: they are logged in full
//! and folded into a short, user-facing message on the snapshot.

use thiserror::Error;

/// Errors returned by a [`TaskService`](crate::service::TaskService)
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request never produced a response (connect, timeout, I/O)
    #[error("Request to '{endpoint}' failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("'{endpoint}' returned status {status}{}", reason_suffix(.reason))]
    Status {
        endpoint: String,
        status: u16,
        reason: Option<String>,
    },

    /// The response body did not match the expected schema
    #[error("Malformed response from '{endpoint}': {details}")]
    Decode { endpoint: String, details: String },

    /// The service refused the request with an explicit reason
    #[error("'{endpoint}' rejected the request: {reason}")]
    Rejected { endpoint: String, reason: String },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

impl ServiceError {
    /// Endpoint (method and path) the failing request targeted
    pub fn endpoint(&self) -> &str {
        match self {
            ServiceError::Transport { endpoint, .. }
            | ServiceError::Status { endpoint, .. }
            | ServiceError::Decode { endpoint, .. }
            | ServiceError::Rejected { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status, if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            ServiceError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Reason string communicated by the service, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            ServiceError::Status { reason, .. } => reason.as_deref(),
            ServiceError::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport { .. } => true,
            ServiceError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for remote service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The operation referenced a task missing from the local snapshot
    #[error("Task not found")]
    TaskNotFound(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Some calls of a bulk operation failed
    #[error("{failed} of {total} requests failed")]
    PartialBatch {
        failed: usize,
        total: usize,
        #[source]
        first: ServiceError,
    },
}

impl StoreError {
    /// Message stored on the snapshot for the view to display
    ///
    /// Local validation errors use their own fixed text. Remote failures use
    /// the operation's fallback text, extended with the service's reason
    /// when it gave one.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            StoreError::TaskNotFound(_) => self.to_string(),
            StoreError::Service(err) => match err.reason() {
                Some(reason) => format!("{}: {}", fallback, reason),
                None => fallback.to_string(),
            },
            StoreError::PartialBatch { failed, total, first } => {
                let base = if failed < total {
                    format!("{} ({} of {} failed)", fallback, failed, total)
                } else {
                    fallback.to_string()
                };
                match first.reason() {
                    Some(reason) => format!("{}: {}", base, reason),
                    None => base,
                }
            }
        }
    }
}
