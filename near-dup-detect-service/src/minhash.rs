use crate::error::DetectionError;
use crate::normalize::NormalizedRecord;
use crate::progress::{scaled_progress, CancelToken, ProgressReporter};
use crate::result::Comparison;
use crate::shingle::shingles;
use crate::strategy::{JaccardParams, SimilarityStrategy};
use near_dup_service::dto::Algorithm;
use rand::prelude::*;
use rayon::prelude::*;
use rustc_hash::{FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Modulus of every affine hash, the Mersenne prime 2^31 - 1.
pub const PRIME: u64 = (1 << 31) - 1;

const SIGNATURE_CHECKPOINT: usize = 50;
const COMPARISON_CHECKPOINT: u64 = 500;

/// `h(x) = (a·x + b) mod P`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashFunction {
    pub a: u64,
    pub b: u64,
}

impl HashFunction {
    #[inline]
    pub fn apply(&self, x: u64) -> u32 {
        // a <= 10^6 and x mod P < 2^31, so the product stays well inside u64
        ((self.a * (x % PRIME) + self.b) % PRIME) as u32
    }
}

///
/// The ordered set of hash functions shared by every signature of one run.
/// Signatures built from different families cannot be compared.
///
#[derive(Clone, Debug)]
pub struct HashFamily {
    functions: Vec<HashFunction>,
}

impl HashFamily {
    ///
    /// Draws `num_perm` hash functions with `a` in `[1, 10^6]` and `b` in
    /// `[0, 10^6)`.
    ///
    pub fn generate<R: Rng>(num_perm: usize, rng: &mut R) -> Self {
        let functions = (0..num_perm)
            .map(|_| HashFunction {
                a: rng.gen_range(1..=1_000_000),
                b: rng.gen_range(0..1_000_000),
            })
            .collect();
        HashFamily { functions }
    }

    pub fn from_entropy(num_perm: usize) -> Self {
        Self::generate(num_perm, &mut StdRng::from_entropy())
    }

    pub fn with_seed(num_perm: usize, seed: u64) -> Self {
        Self::generate(num_perm, &mut StdRng::seed_from_u64(seed))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> &[HashFunction] {
        &self.functions
    }
}

///
/// MinHash signature of a shingle set: for each function of the family, the
/// smallest value it takes over the set. An empty set leaves every slot at
/// `u32::MAX`, so two empty texts estimate as identical.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub hash_values: Vec<u32>,
}

impl Signature {
    pub fn build(items: &FxHashSet<&str>, family: &HashFamily) -> Self {
        let mut hash_values = vec![u32::MAX; family.len()];
        for item in items {
            let item_hash = calculate_hash(item);
            for (slot, function) in hash_values.iter_mut().zip(family.functions()) {
                *slot = (*slot).min(function.apply(item_hash));
            }
        }
        Signature { hash_values }
    }

    /// Fraction of slots on which both signatures agree.
    pub fn jaccard_similarity(&self, other: &Signature) -> f64 {
        debug_assert_eq!(self.hash_values.len(), other.hash_values.len());
        if self.hash_values.is_empty() {
            return 0.0;
        }
        let equal_count = self
            .hash_values
            .iter()
            .zip(&other.hash_values)
            .filter(|&(a, b)| a == b)
            .count();
        equal_count as f64 / self.hash_values.len() as f64
    }
}

#[inline]
fn calculate_hash<T: Hash + ?Sized>(t: &T) -> u64 {
    let mut s = FxHasher::default();
    t.hash(&mut s);
    s.finish()
}

/// Jaccard estimation over shingle-set signatures.
pub struct JaccardStrategy {
    params: JaccardParams,
    family: HashFamily,
    signatures: Vec<Signature>,
}

impl JaccardStrategy {
    pub fn new(params: JaccardParams) -> Self {
        let family = match params.seed {
            Some(seed) => HashFamily::with_seed(params.num_perm, seed),
            None => HashFamily::from_entropy(params.num_perm),
        };
        JaccardStrategy {
            params,
            family,
            signatures: Vec::new(),
        }
    }
}

impl SimilarityStrategy for JaccardStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Minhash
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
        (50, 90)
    }

    fn checkpoint_status(&self, completed: u64, total: u64) -> String {
        format!("Compared {completed}/{total} pairs...")
    }

    fn extract_features(
        &mut self,
        records: &[NormalizedRecord],
        reporter: &mut ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<(), DetectionError> {
        reporter.report(10, "Generating MinHash signatures...");
        let total = records.len();
        let k = self.params.shingle_size;
        let family = &self.family;
        self.signatures = Vec::with_capacity(total);
        for chunk in records.chunks(SIGNATURE_CHECKPOINT) {
            cancel.check()?;
            self.signatures.par_extend(
                chunk
                    .par_iter()
                    .map(|record| Signature::build(&shingles(&record.normalized, k), family)),
            );
            let done = self.signatures.len();
            reporter.report(
                scaled_progress(done as u64, total as u64, (10, 50)),
                format!("Generated {done}/{total} signatures..."),
            );
        }
        debug!(signatures = total, num_perm = family.len(), "signatures built");
        reporter.report(50, "Comparing signatures...");
        Ok(())
    }

    fn compare(&mut self, records: &[NormalizedRecord], i: usize, j: usize) -> Comparison {
        let similarity = self.signatures[i].jaccard_similarity(&self.signatures[j]);
        Comparison::new((i, j), (records[i].index, records[j].index), similarity, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_text;

    fn signature_of(text: &str, family: &HashFamily) -> Signature {
        Signature::build(&shingles(&normalize_text(text), 3), family)
    }

    #[test]
    fn test_family_respects_parameter_ranges() {
        let family = HashFamily::with_seed(512, 7);
        assert_eq!(family.len(), 512);
        assert!(!family.is_empty());
        assert!(HashFamily::with_seed(0, 7).is_empty());
        for f in family.functions() {
            assert!((1..=1_000_000).contains(&f.a));
            assert!(f.b < 1_000_000);
        }
    }

    #[test]
    fn test_seeded_family_is_reproducible() {
        let a = HashFamily::with_seed(64, 99);
        let b = HashFamily::with_seed(64, 99);
        assert_eq!(a.functions(), b.functions());
    }

    #[test]
    fn test_hash_function_stays_below_prime() {
        let f = HashFunction { a: 1_000_000, b: 999_999 };
        for x in [0, 1, PRIME - 1, PRIME, u64::MAX] {
            assert!((f.apply(x) as u64) < PRIME);
        }
    }

    #[test]
    fn test_self_similarity_is_exact_for_any_family() {
        for seed in 0..10 {
            let family = HashFamily::with_seed(64, seed);
            let sig = signature_of("The quick brown fox jumps over the lazy dog", &family);
            assert_eq!(sig.jaccard_similarity(&sig.clone()), 1.0);
        }
        let family = HashFamily::from_entropy(32);
        let sig = signature_of("another text", &family);
        assert_eq!(sig.jaccard_similarity(&sig), 1.0);
    }

    #[test]
    fn test_signature_length_matches_family() {
        let family = HashFamily::with_seed(128, 1);
        assert_eq!(signature_of("hello world", &family).hash_values.len(), 128);
    }

    #[test]
    fn test_empty_shingle_set_is_all_max() {
        let family = HashFamily::with_seed(16, 3);
        let sig = signature_of("ab", &family);
        assert!(sig.hash_values.iter().all(|&v| v == u32::MAX));
        assert_eq!(sig.jaccard_similarity(&signature_of("", &family)), 1.0);
    }

    #[test]
    fn test_estimates_agree_on_clear_cases_across_families() {
        let base = "the quick brown fox jumps over the lazy dog near the riverbank today";
        let near = "the quick brown fox jumps over the lazy dog near the riverbank todya";
        let far = "completely unrelated sentence about quarterly revenue figures";
        for seed in 0..10 {
            let family = HashFamily::with_seed(256, seed);
            let s_base = signature_of(base, &family);
            assert!(s_base.jaccard_similarity(&signature_of(near, &family)) >= 0.7);
            assert!(s_base.jaccard_similarity(&signature_of(far, &family)) < 0.3);
        }
    }
}
