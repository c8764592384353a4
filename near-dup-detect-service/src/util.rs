use crate::error::DetectionError;
use csv::Reader;
use near_dup_service::dto::{DataFile, DetectionRequest, Record};
use near_dup_service::error::ServiceError;
use near_dup_service::util::{download_object_from_s3, get_region};
use rusoto_core::Client;
use rusoto_s3::S3Client;
use serde_json::Value;

///
/// Accepts a JSON array of objects as records, indexed by position.
///
pub fn parse_records(data: Value) -> Result<Vec<Record>, DetectionError> {
    match data {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => Ok(Record::new(index, fields)),
                _ => Err(DetectionError::input(format!("record {index} is not an object"))),
            })
            .collect(),
        _ => Err(DetectionError::input("Invalid data format")),
    }
}

///
/// Reads CSV bytes into records. The header row names the fields; every
/// value is kept as a string, in column order.
///
pub fn records_from_csv(bytes: &[u8]) -> Result<Vec<Record>, DetectionError> {
    let mut reader = Reader::from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|err| DetectionError::input(format!("unreadable CSV header: {err}")))?
        .clone();
    reader
        .records()
        .enumerate()
        .map(|(index, row)| match row {
            Ok(row) => Ok(Record::from_pairs(index, headers.iter().zip(row.iter()))),
            Err(err) => Err(DetectionError::input(format!("CSV row {index}: {err}"))),
        })
        .collect()
}

pub async fn pull_data_file(data: &DataFile) -> Result<Vec<Record>, ServiceError> {
    let client = S3Client::new_with_client(Client::shared(), get_region()?);
    let bytes = download_object_from_s3(&client, data.bucket.clone(), data.key.clone()).await?;
    records_from_csv(bytes.as_slice()).map_err(ServiceError::from)
}

/// Loads the records a request points at: inline data first, then the S3 file.
pub async fn load_records(request: &DetectionRequest) -> Result<Vec<Record>, ServiceError> {
    match (&request.data, &request.file) {
        (Some(data), _) => parse_records(data.clone()).map_err(ServiceError::from),
        (None, Some(file)) => pull_data_file(file).await,
        (None, None) => Err(ServiceError::bad_request(
            "request must contain either 'data' or 'file'",
        )),
    }
}
