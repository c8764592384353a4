use near_dup_service::dto::Algorithm;
use near_dup_service::error::ServiceError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure modes of a detection run.
#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    /// The records handed in could not be accepted; raised before any worker starts.
    #[error("invalid input: {0}")]
    Input(String),
    /// A fault while normalizing, hashing or comparing records.
    #[error("{algorithm} computation failed: {msg}")]
    Computation { algorithm: Algorithm, msg: String },
    #[error("{algorithm} worker timed out after {}ms", .limit.as_millis())]
    Timeout { algorithm: Algorithm, limit: Duration },
    /// The worker went away without reporting a result or an error.
    #[error("{algorithm} worker stopped without a result")]
    AbnormalTermination { algorithm: Algorithm },
    /// The run was cancelled by its caller. Never reported as an event.
    #[error("run cancelled")]
    Cancelled,
}

/// Machine-readable category of a failed run, carried on the `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Input,
    Computation,
    Timeout,
    AbnormalTermination,
    Cancelled,
}

impl DetectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectionError::Input(_) => ErrorKind::Input,
            DetectionError::Computation { .. } => ErrorKind::Computation,
            DetectionError::Timeout { .. } => ErrorKind::Timeout,
            DetectionError::AbnormalTermination { .. } => ErrorKind::AbnormalTermination,
            DetectionError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn input<T: std::fmt::Display>(msg: T) -> Self {
        DetectionError::Input(msg.to_string())
    }

    pub fn computation<T: std::fmt::Display>(algorithm: Algorithm, msg: T) -> Self {
        DetectionError::Computation {
            algorithm,
            msg: msg.to_string(),
        }
    }
}

impl From<DetectionError> for ServiceError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::Input(msg) => ServiceError::bad_request(msg),
            err @ DetectionError::Timeout { .. } => ServiceError::gateway_timeout(err),
            err => ServiceError::internal_server_error(err),
        }
    }
}
