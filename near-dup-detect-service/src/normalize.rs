use near_dup_service::dto::Record;
use rayon::prelude::*;
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("record {index}: field '{field}' holds a nested value, expected a scalar")]
pub struct NormalizeError {
    pub index: usize,
    pub field: String,
}

/// A record together with the canonical text it is compared by.
#[derive(Debug, Clone)]
pub struct NormalizedRecord<'a> {
    pub index: usize,
    pub original: &'a Record,
    pub normalized: String,
}

///
/// Lower-cases `text`, drops every character that is neither alphanumeric nor
/// whitespace, collapses whitespace runs into one space and trims both ends.
///
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

fn stringify<'v>(index: usize, field: &str, value: &'v Value) -> Result<Cow<'v, str>, NormalizeError> {
    match value {
        Value::String(s) => Ok(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Bool(b) => Ok(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Null => Ok(Cow::Borrowed("")),
        Value::Array(_) | Value::Object(_) => Err(NormalizeError {
            index,
            field: field.to_string(),
        }),
    }
}

pub fn normalize_record(record: &Record) -> Result<NormalizedRecord<'_>, NormalizeError> {
    let values = record
        .fields
        .iter()
        .map(|(field, value)| stringify(record.index, field, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NormalizedRecord {
        index: record.index,
        original: record,
        normalized: normalize_text(&values.join(" ")),
    })
}

/// Normalizes every record, preserving input order.
pub fn normalize_all(records: &[Record]) -> Result<Vec<NormalizedRecord<'_>>, NormalizeError> {
    records.par_iter().map(normalize_record).collect()
}
