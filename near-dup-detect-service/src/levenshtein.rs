use crate::error::DetectionError;
use crate::normalize::NormalizedRecord;
use crate::progress::{CancelToken, ProgressReporter};
use crate::result::Comparison;
use crate::strategy::{EditDistanceParams, SimilarityStrategy};
use near_dup_service::dto::Algorithm;
use rustc_hash::FxHashMap;
use std::mem;

const COMPARISON_CHECKPOINT: u64 = 250;

/// Minimum number of single-character edits turning `a` into `b`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(curr[j])
            };
        }
        mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`, with two empty strings counting as identical.
pub fn similarity_from_distance(distance: usize, a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - distance as f64 / max_len as f64
}

///
/// Run-scoped memo of computed distances. Keys are unordered: `(a, b)` and
/// `(b, a)` share one entry. Once `capacity` entries are stored, further
/// distances are still computed but no longer remembered.
///
#[derive(Debug, Default)]
pub struct DistanceCache {
    entries: FxHashMap<String, FxHashMap<String, usize>>,
    len: usize,
    capacity: Option<usize>,
}

impl DistanceCache {
    pub fn new(capacity: Option<usize>) -> Self {
        DistanceCache {
            capacity,
            ..Default::default()
        }
    }

    #[inline]
    fn key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<usize> {
        let (first, second) = Self::key(a, b);
        self.entries.get(first)?.get(second).copied()
    }

    pub fn insert(&mut self, a: &str, b: &str, distance: usize) {
        if self.capacity.is_some_and(|cap| self.len >= cap) {
            return;
        }
        let (first, second) = Self::key(a, b);
        let inner = self.entries.entry(first.to_owned()).or_default();
        if inner.insert(second.to_owned(), distance).is_none() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Exact edit distance over normalized text, memoized for the run.
pub struct EditDistanceStrategy {
    params: EditDistanceParams,
    cache: DistanceCache,
}

impl EditDistanceStrategy {
    pub fn new(params: EditDistanceParams) -> Self {
        let cache = DistanceCache::new(params.cache_capacity);
        EditDistanceStrategy { params, cache }
    }

    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        if let Some(distance) = self.cache.get(a, b) {
            return distance;
        }
        let distance = edit_distance(a, b);
        self.cache.insert(a, b, distance);
        distance
    }
}

impl SimilarityStrategy for EditDistanceStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Levenshtein
    }

    fn threshold(&self) -> f64 {
        self.params.threshold
    }

    fn result_cap(&self) -> usize {
        self.params.result_cap
    }

    fn checkpoint_interval(&self) -> u64 {
        COMPARISON_CHECKPOINT
    }

    fn comparison_span(&self) -> (u8, u8) {
        (10, 90)
    }

    fn checkpoint_status(&self, completed: u64, total: u64) -> String {
        format!("Processed {completed}/{total} comparisons...")
    }

    fn extract_features(
        &mut self,
        _records: &[NormalizedRecord],
        reporter: &mut ProgressReporter,
        _cancel: &CancelToken,
    ) -> Result<(), DetectionError> {
        reporter.report(10, "Starting pairwise comparisons...");
        Ok(())
    }

    fn compare(&mut self, records: &[NormalizedRecord], i: usize, j: usize) -> Comparison {
        let (a, b) = (&records[i].normalized, &records[j].normalized);
        let distance = self.distance(a, b);
        let similarity = similarity_from_distance(distance, a, b);
        Comparison::new(
            (i, j),
            (records[i].index, records[j].index),
            similarity,
            Some(distance),
        )
    }

    fn cache_size(&self) -> Option<usize> {
        Some(self.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classic_distances() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("flaw", "lawn"), 2);
        assert_eq!(edit_distance("hello world", "helllo world"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("", ""), 0);
    }

    #[test]
    fn test_distance_counts_characters_not_bytes() {
        assert_eq!(edit_distance("café", "cafe"), 1);
        assert_eq!(similarity_from_distance(1, "café", "cafe"), 0.75);
    }

    #[test]
    fn test_empty_strings_are_identical() {
        assert_eq!(similarity_from_distance(edit_distance("", ""), "", ""), 1.0);
    }

    #[test]
    fn test_similarity_of_single_insertion() {
        let similarity = similarity_from_distance(1, "hello world", "helllo world");
        assert!((similarity - 0.916_666).abs() < 1e-5);
    }

    #[test]
    fn test_cache_key_is_symmetric() {
        let mut cache = DistanceCache::new(None);
        assert!(cache.is_empty());
        cache.insert("abc", "abd", 1);
        assert_eq!(cache.get("abd", "abc"), Some(1));
        cache.insert("abd", "abc", 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_cache_stops_growing_at_capacity() {
        let mut cache = DistanceCache::new(Some(2));
        cache.insert("a", "b", 1);
        cache.insert("a", "c", 1);
        cache.insert("a", "d", 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a", "d"), None);
    }

    #[test]
    fn test_strategy_reuses_cached_distance() {
        let mut strategy = EditDistanceStrategy::new(EditDistanceParams::default());
        assert_eq!(strategy.distance("same text", "same test"), 1);
        assert_eq!(strategy.distance("same test", "same text"), 1);
        assert_eq!(strategy.cache_size(), Some(1));
    }

    #[test]
    fn test_checkpoint_status_counts_comparisons() {
        let strategy = EditDistanceStrategy::new(EditDistanceParams::default());
        assert_eq!(
            strategy.checkpoint_status(250, 1770),
            "Processed 250/1770 comparisons..."
        );
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(a in "[a-e ]{0,24}", b in "[a-e ]{0,24}") {
            prop_assert_eq!(edit_distance(&a, &b), edit_distance(&b, &a));
        }

        #[test]
        fn prop_distance_is_bounded(a in "\\PC{0,24}", b in "\\PC{0,24}") {
            let d = edit_distance(&a, &b);
            prop_assert!(d <= a.chars().count().max(b.chars().count()));
        }

        #[test]
        fn prop_self_similarity_is_one(a in "\\PC{0,32}") {
            prop_assert_eq!(similarity_from_distance(edit_distance(&a, &a), &a, &a), 1.0);
        }
    }
}
