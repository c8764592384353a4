use crate::normalize::NormalizedRecord;
use near_dup_service::dto::Algorithm;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Outcome of scoring one pair of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Dataset indices of the two records.
    pub indices: (usize, usize),
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
    /// Positions of the two records within the run's record slice.
    #[serde(skip)]
    positions: (usize, usize),
}

impl Comparison {
    pub fn new(
        positions: (usize, usize),
        indices: (usize, usize),
        similarity: f64,
        distance: Option<usize>,
    ) -> Self {
        Comparison {
            indices,
            similarity,
            distance,
            positions,
        }
    }
}

/// A reported duplicate pair together with the two original records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Duplicate {
    pub item1: Map<String, Value>,
    pub item2: Map<String, Value>,
    #[serde(flatten)]
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    #[serde(skip)]
    pub algorithm: Algorithm,
    pub algorithm_name: String,
    pub threshold: f64,
    pub total_items: usize,
    /// Count before the `duplicates` list was truncated.
    pub duplicates_found: usize,
    pub duplicates: Vec<Duplicate>,
    pub total_comparisons: u64,
    pub execution_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
}

///
/// Turns the raw matches of a run into its `ProcessingResult`: highest
/// similarity first, ties kept in the order the pairs were found, and at
/// most `cap` entries listed.
///
pub struct Aggregator {
    pub algorithm: Algorithm,
    pub threshold: f64,
    pub cap: usize,
}

impl Aggregator {
    pub fn finish(
        self,
        records: &[NormalizedRecord],
        mut matches: Vec<Comparison>,
        total_comparisons: u64,
        elapsed: Duration,
        cache_size: Option<usize>,
    ) -> ProcessingResult {
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        let duplicates_found = matches.len();
        matches.truncate(self.cap);
        let duplicates = matches
            .into_iter()
            .map(|comparison| {
                let (i, j) = comparison.positions;
                Duplicate {
                    item1: records[i].original.fields.clone(),
                    item2: records[j].original.fields.clone(),
                    comparison,
                }
            })
            .collect();
        ProcessingResult {
            algorithm: self.algorithm,
            algorithm_name: self.algorithm.display_name().to_string(),
            threshold: self.threshold,
            total_items: records.len(),
            duplicates_found,
            duplicates,
            total_comparisons,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            cache_size,
        }
    }

    /// Result of a run with nothing to compare.
    pub fn empty(self, total_items: usize, elapsed: Duration, cache_size: Option<usize>) -> ProcessingResult {
        ProcessingResult {
            algorithm: self.algorithm,
            algorithm_name: self.algorithm.display_name().to_string(),
            threshold: self.threshold,
            total_items,
            duplicates_found: 0,
            duplicates: Vec::new(),
            total_comparisons: 0,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            cache_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_all;
    use near_dup_service::dto::Record;
    use serde_json::json;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_pairs(i, vec![("name", format!("row {i}"))]))
            .collect()
    }

    fn aggregator(cap: usize) -> Aggregator {
        Aggregator {
            algorithm: Algorithm::Levenshtein,
            threshold: 0.8,
            cap,
        }
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let raw = records(4);
        let normalized = normalize_all(&raw).unwrap();
        let matches = vec![
            Comparison::new((0, 1), (0, 1), 0.85, Some(2)),
            Comparison::new((0, 2), (0, 2), 0.95, Some(1)),
            Comparison::new((1, 3), (1, 3), 0.85, Some(2)),
            Comparison::new((2, 3), (2, 3), 0.90, Some(1)),
        ];
        let result = aggregator(10).finish(&normalized, matches, 6, Duration::from_millis(3), Some(6));
        let order: Vec<(usize, usize)> = result
            .duplicates
            .iter()
            .map(|d| d.comparison.indices)
            .collect();
        assert_eq!(order, vec![(0, 2), (2, 3), (0, 1), (1, 3)]);
        assert_eq!(result.duplicates[0].item2["name"], json!("row 2"));
    }

    #[test]
    fn test_truncation_keeps_untruncated_count() {
        let raw = records(12);
        let normalized = normalize_all(&raw).unwrap();
        let matches: Vec<Comparison> = (1..12)
            .map(|j| Comparison::new((0, j), (0, j), 0.9, None))
            .collect();
        let result = aggregator(5).finish(&normalized, matches, 66, Duration::ZERO, None);
        assert_eq!(result.duplicates_found, 11);
        assert_eq!(result.duplicates.len(), 5);
        assert!(result.duplicates_found >= result.duplicates.len());
    }

    #[test]
    fn test_serialized_shape() {
        let raw = records(2);
        let normalized = normalize_all(&raw).unwrap();
        let matches = vec![Comparison::new((0, 1), (0, 1), 0.9, Some(1))];
        let result = aggregator(50).finish(&normalized, matches, 1, Duration::from_millis(2), Some(1));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["algorithmName"], json!("Levenshtein Distance"));
        assert_eq!(value["duplicatesFound"], json!(1));
        assert_eq!(value["totalComparisons"], json!(1));
        assert_eq!(value["cacheSize"], json!(1));
        assert_eq!(value["duplicates"][0]["indices"], json!([0, 1]));
        assert_eq!(value["duplicates"][0]["distance"], json!(1));
        assert!(value["duplicates"][0].get("positions").is_none());
        assert!(value.get("algorithm").is_none());
    }

    #[test]
    fn test_jaccard_result_omits_distance_and_cache() {
        let raw = records(2);
        let normalized = normalize_all(&raw).unwrap();
        let matches = vec![Comparison::new((0, 1), (0, 1), 0.75, None)];
        let result = Aggregator {
            algorithm: Algorithm::Minhash,
            threshold: 0.7,
            cap: 50,
        }
        .finish(&normalized, matches, 1, Duration::ZERO, None);
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("cacheSize").is_none());
        assert!(value["duplicates"][0].get("distance").is_none());
    }
}
