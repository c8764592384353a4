use crate::error::ServiceError;
use futures::stream::TryStreamExt;
use rusoto_core::Region;
use rusoto_s3::{GetObjectRequest, S3Client, S3};
use std::env;
use std::str::FromStr;

pub fn get_region() -> Result<Region, ServiceError> {
    let val = get_env_var("REGION")?;
    Region::from_str(val.as_str())
        .map_err(|_| ServiceError::internal_server_error(format!("Unable to parse region {}", val)))
}

pub fn get_env_var(name: &str) -> Result<String, ServiceError> {
    env::var(name).map_err(|_| {
        ServiceError::internal_server_error(format!("Environment variable '{}' not found", name))
    })
}

///
/// Reads an optional numeric setting from the environment, falling back to
/// `default` when the variable is unset. A value that does not parse is an error.
///
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ServiceError> {
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|_| {
            ServiceError::internal_server_error(format!(
                "Environment variable '{}' has invalid value '{}'",
                name, val
            ))
        }),
        Err(_) => Ok(default),
    }
}

pub async fn download_object_from_s3(
    client: &S3Client,
    bucket: String,
    key: String,
) -> Result<Vec<u8>, ServiceError> {
    let request = GetObjectRequest {
        bucket,
        key,
        ..Default::default()
    };
    let mut object = client
        .get_object(request)
        .await
        .map_err(ServiceError::internal_server_error)?;
    let body = object
        .body
        .take()
        .ok_or(ServiceError::internal_server_error(
            "Unable to extract body",
        ))?;
    body.map_ok(|b| b.to_vec())
        .try_concat()
        .await
        .map_err(ServiceError::internal_server_error)
}
