use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DataFile {
    pub bucket: String,
    pub key: String,
}

/// The two similarity strategies the service can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Minhash,
    Levenshtein,
}

impl Algorithm {
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::Minhash => "minhash",
            Algorithm::Levenshtein => "levenshtein",
        }
    }

    /// Short name used in progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::Minhash => "MinHash",
            Algorithm::Levenshtein => "Levenshtein",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Algorithm::Minhash => "MinHash (Jaccard Similarity)",
            Algorithm::Levenshtein => "Levenshtein Distance",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmSelection {
    #[default]
    Both,
    Minhash,
    Levenshtein,
}

impl AlgorithmSelection {
    pub fn algorithms(&self) -> Vec<Algorithm> {
        match self {
            AlgorithmSelection::Both => vec![Algorithm::Minhash, Algorithm::Levenshtein],
            AlgorithmSelection::Minhash => vec![Algorithm::Minhash],
            AlgorithmSelection::Levenshtein => vec![Algorithm::Levenshtein],
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinHashOptions {
    pub threshold: Option<f64>,
    pub num_perm: Option<usize>,
    pub shingle_size: Option<usize>,
    pub result_cap: Option<usize>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevenshteinOptions {
    pub threshold: Option<f64>,
    pub result_cap: Option<usize>,
    pub cache_capacity: Option<usize>,
}

/// Shape of the event transcript returned from a `detect` invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// A JSON array of events.
    #[default]
    Json,
    /// A single string of `data: {event}` frames separated by blank lines.
    Sse,
}

/// Payload of a `detect` invocation.
///
/// Records come either inline (`data`, a JSON array of objects) or from a CSV
/// file in S3 (`file`). When both are present the inline data wins.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub data: Option<Value>,
    pub file: Option<DataFile>,
    #[serde(default)]
    pub algorithm: AlgorithmSelection,
    /// Applies to every selected algorithm unless overridden below.
    pub threshold: Option<f64>,
    pub minhash: Option<MinHashOptions>,
    pub levenshtein: Option<LevenshteinOptions>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub format: ResponseFormat,
}

/// Lambda payload. `action` selects the operation; a payload without one is
/// a detection request.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServiceRequest {
    Detect(DetectionRequest),
    Health,
}

impl<'de> Deserialize<'de> for ServiceRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut payload: Map<String, Value> = Map::deserialize(deserializer)?;
        let action = match payload.remove("action") {
            None => None,
            Some(Value::String(action)) => Some(action),
            Some(other) => {
                return Err(de::Error::invalid_type(
                    de::Unexpected::Other(&other.to_string()),
                    &"an action name",
                ))
            }
        };
        match action.as_deref() {
            None | Some("detect") => DetectionRequest::deserialize(Value::Object(payload))
                .map(ServiceRequest::Detect)
                .map_err(de::Error::custom),
            Some("health") => Ok(ServiceRequest::Health),
            Some(other) => Err(de::Error::unknown_variant(other, &["detect", "health"])),
        }
    }
}

/// A single input row: its position in the dataset plus its fields in the
/// order the caller supplied them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub index: usize,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(index: usize, fields: Map<String, Value>) -> Self {
        Record { index, fields }
    }

    /// Builds a record whose fields are all strings, e.g. a CSV row.
    pub fn from_pairs<K, V, I>(index: usize, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Record { index, fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selection_expands_to_algorithms() {
        assert_eq!(
            AlgorithmSelection::Both.algorithms(),
            vec![Algorithm::Minhash, Algorithm::Levenshtein]
        );
        assert_eq!(
            AlgorithmSelection::Levenshtein.algorithms(),
            vec![Algorithm::Levenshtein]
        );
    }

    #[test]
    fn test_request_defaults_to_both() {
        let request: DetectionRequest = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert_eq!(request.algorithm, AlgorithmSelection::Both);
        assert!(request.threshold.is_none());
        assert_eq!(request.format, ResponseFormat::Json);
    }

    #[test]
    fn test_service_request_is_tagged_by_action() {
        let request: ServiceRequest = serde_json::from_value(json!({
            "action": "detect",
            "algorithm": "minhash",
            "minhash": { "numPerm": 128 }
        }))
        .unwrap();
        match request {
            ServiceRequest::Detect(req) => {
                assert_eq!(req.algorithm, AlgorithmSelection::Minhash);
                assert_eq!(req.minhash.unwrap().num_perm, Some(128));
            }
            ServiceRequest::Health => panic!("expected detect"),
        }
        let health: ServiceRequest = serde_json::from_value(json!({ "action": "health" })).unwrap();
        assert!(matches!(health, ServiceRequest::Health));
    }

    #[test]
    fn test_payload_without_action_is_a_detect_request() {
        let request: ServiceRequest =
            serde_json::from_value(json!({ "data": [{ "a": "x" }] })).unwrap();
        match request {
            ServiceRequest::Detect(req) => {
                assert_eq!(req.data, Some(json!([{ "a": "x" }])));
                assert_eq!(req.algorithm, AlgorithmSelection::Both);
            }
            ServiceRequest::Health => panic!("expected detect"),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = serde_json::from_value::<ServiceRequest>(json!({ "action": "purge" })).unwrap_err();
        assert!(err.to_string().contains("purge"));
        assert!(serde_json::from_value::<ServiceRequest>(json!({ "action": 7 })).is_err());
    }

    #[test]
    fn test_record_from_pairs_keeps_column_order() {
        let record = Record::from_pairs(3, vec![("zeta", "1"), ("alpha", "2")]);
        let keys: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(record.index, 3);
    }
}
