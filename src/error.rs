use crate::response::Status;
use serde::{Deserialize, Serialize};
use serde_json;
use std::error;
use std::fmt;

/// Error surfaced to the invoker of the service, carrying the status code the
/// response payload will report.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceError {
    pub msg: String,
    pub status: Status,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

impl error::Error for ServiceError {}

impl ServiceError {
    fn with_status<T: fmt::Display>(msg: T, status: Status) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status,
        }
    }

    pub fn bad_request<T: fmt::Display>(msg: T) -> ServiceError {
        Self::with_status(msg, Status::BadRequest)
    }

    pub fn internal_server_error<T: fmt::Display>(msg: T) -> ServiceError {
        Self::with_status(msg, Status::InternalServerError)
    }

    pub fn gateway_timeout<T: fmt::Display>(msg: T) -> ServiceError {
        Self::with_status(msg, Status::GatewayTimeout)
    }
}
