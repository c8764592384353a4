use serde::{de, Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Accepted,
    BadRequest,
    InternalServerError,
    GatewayTimeout,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Accepted => 202,
            Status::BadRequest => 400,
            Status::InternalServerError => 500,
            Status::GatewayTimeout => 504,
        }
    }
}

impl TryFrom<u64> for Status {
    type Error = String;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(Status::Ok),
            202 => Ok(Status::Accepted),
            400 => Ok(Status::BadRequest),
            500 => Ok(Status::InternalServerError),
            504 => Ok(Status::GatewayTimeout),
            value => Err(format!("unsupported status code {value}")),
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.code())
    }
}

struct StatusCodeVisitor;

impl<'de> de::Visitor<'de> for StatusCodeVisitor {
    type Value = Status;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an HTTP status code")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Status::try_from(v).map_err(de::Error::custom)
    }
}

impl<'de> de::Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u16(StatusCodeVisitor)
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub status_code: Status,
    pub headers: Value,
    pub body: Value,
}

impl ResponsePayload {
    fn new(status_code: Status, body: Value) -> Self {
        ResponsePayload {
            status_code,
            headers: json!({
                "Content-Type": "application/json",
                "Cache-Control": "no-cache",
                "Access-Control-Allow-Origin": "*"
            }),
            body,
        }
    }
}

///
/// Wraps the outcome of a handler into the `{statusCode, headers, body}`
/// envelope returned by every function invocation. Errors become a plain
/// `{"error": msg}` body under their own status code.
///
pub fn make_response_payload(
    result: Result<Value, ServiceError>,
) -> Result<Value, lambda_runtime::Error> {
    let response_payload = match result {
        Err(err) => ResponsePayload::new(err.status, json!({ "error": err.msg })),
        Ok(body) => ResponsePayload::new(Status::Ok, body),
    };
    serde_json::to_value(response_payload).map_err(lambda_runtime::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_code() {
        let status: Status = serde_json::from_value(json!(504)).unwrap();
        assert_eq!(status, Status::GatewayTimeout);
        assert_eq!(serde_json::to_value(Status::BadRequest).unwrap(), json!(400));
        assert!(serde_json::from_value::<Status>(json!(418)).is_err());
    }

    #[test]
    fn test_error_payload_carries_status_and_message() {
        let payload =
            make_response_payload(Err(ServiceError::bad_request("Invalid data format"))).unwrap();
        assert_eq!(payload["statusCode"], json!(400));
        assert_eq!(payload["body"]["error"], json!("Invalid data format"));
        assert_eq!(payload["headers"]["Access-Control-Allow-Origin"], json!("*"));
    }

    #[test]
    fn test_ok_payload_wraps_body() {
        let payload = make_response_payload(Ok(json!({ "events": [] }))).unwrap();
        assert_eq!(payload["statusCode"], json!(200));
        assert_eq!(payload["body"], json!({ "events": [] }));
    }
}
