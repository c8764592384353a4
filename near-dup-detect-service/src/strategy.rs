use crate::error::DetectionError;
use crate::normalize::NormalizedRecord;
use crate::progress::{CancelToken, ProgressReporter};
use crate::result::Comparison;
use crate::shingle::DEFAULT_SHINGLE_SIZE;
use near_dup_service::dto::Algorithm;

pub const DEFAULT_RESULT_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct JaccardParams {
    pub threshold: f64,
    pub num_perm: usize,
    pub shingle_size: usize,
    pub result_cap: usize,
    /// Fixes the hash family, for reproducible runs. Fresh entropy otherwise.
    pub seed: Option<u64>,
}

impl Default for JaccardParams {
    fn default() -> Self {
        JaccardParams {
            threshold: 0.7,
            num_perm: 64,
            shingle_size: DEFAULT_SHINGLE_SIZE,
            result_cap: DEFAULT_RESULT_CAP,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditDistanceParams {
    pub threshold: f64,
    pub result_cap: usize,
    /// Maximum number of memoized distances; `None` means unbounded.
    pub cache_capacity: Option<usize>,
}

impl Default for EditDistanceParams {
    fn default() -> Self {
        EditDistanceParams {
            threshold: 0.8,
            result_cap: DEFAULT_RESULT_CAP,
            cache_capacity: Some(500_000),
        }
    }
}

/// Which similarity strategy a run uses, with its tuning.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    Jaccard(JaccardParams),
    EditDistance(EditDistanceParams),
}

impl StrategyConfig {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            StrategyConfig::Jaccard(_) => Algorithm::Minhash,
            StrategyConfig::EditDistance(_) => Algorithm::Levenshtein,
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            StrategyConfig::Jaccard(p) => p.threshold,
            StrategyConfig::EditDistance(p) => p.threshold,
        }
    }
}

///
/// One way of scoring a pair of records. The pairwise comparator owns the
/// loop; a strategy owns whatever per-run state it needs (hash family and
/// signatures, or the distance cache) and is dropped with the run.
///
pub trait SimilarityStrategy {
    fn algorithm(&self) -> Algorithm;

    fn threshold(&self) -> f64;

    fn result_cap(&self) -> usize;

    /// Comparisons between two progress events.
    fn checkpoint_interval(&self) -> u64;

    /// Slice of the progress bar covered by the comparison phase.
    fn comparison_span(&self) -> (u8, u8);

    /// Status line of a comparison checkpoint.
    fn checkpoint_status(&self, completed: u64, total: u64) -> String;

    /// Builds per-record features before any pair is compared.
    fn extract_features(
        &mut self,
        records: &[NormalizedRecord],
        reporter: &mut ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<(), DetectionError>;

    /// Scores the records at positions `i` and `j` of the slice passed to
    /// `extract_features`.
    fn compare(&mut self, records: &[NormalizedRecord], i: usize, j: usize) -> Comparison;

    fn cache_size(&self) -> Option<usize> {
        None
    }
}
