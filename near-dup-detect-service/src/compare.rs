use crate::error::DetectionError;
use crate::normalize::normalize_all;
use crate::progress::{CancelToken, ProgressReporter};
use crate::result::{Aggregator, ProcessingResult};
use crate::strategy::SimilarityStrategy;
use near_dup_service::dto::Record;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Initializing,
    ExtractingFeatures,
    Comparing,
    Complete,
    Failed,
}

///
/// Drives one detection run: normalizes the records, lets the strategy build
/// its features, then scores every unordered pair `i < j` once, emitting a
/// progress event every `checkpoint_interval` comparisons.
///
pub struct PairwiseComparator<S> {
    strategy: S,
    cancel: CancelToken,
    state: RunState,
}

impl<S: SimilarityStrategy> PairwiseComparator<S> {
    pub fn new(strategy: S, cancel: CancelToken) -> Self {
        PairwiseComparator {
            strategy,
            cancel,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!(algorithm = %self.strategy.algorithm(), from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    pub fn run(
        &mut self,
        records: &[Record],
        reporter: &mut ProgressReporter,
    ) -> Result<ProcessingResult, DetectionError> {
        let outcome = self.execute(records, reporter);
        match &outcome {
            Ok(_) => self.transition(RunState::Complete),
            Err(_) => self.transition(RunState::Failed),
        }
        outcome
    }

    fn execute(
        &mut self,
        records: &[Record],
        reporter: &mut ProgressReporter,
    ) -> Result<ProcessingResult, DetectionError> {
        let start = Instant::now();
        let algorithm = self.strategy.algorithm();
        let aggregator = Aggregator {
            algorithm,
            threshold: self.strategy.threshold(),
            cap: self.strategy.result_cap(),
        };

        self.transition(RunState::Initializing);
        reporter.report(0, format!("Initializing {} processor...", algorithm.label()));
        if records.len() < 2 {
            return Ok(aggregator.empty(records.len(), start.elapsed(), self.strategy.cache_size()));
        }

        self.transition(RunState::ExtractingFeatures);
        reporter.report(
            5,
            format!("Preparing data for {} comparison...", algorithm.label()),
        );
        let normalized =
            normalize_all(records).map_err(|err| DetectionError::computation(algorithm, err))?;
        self.strategy
            .extract_features(&normalized, reporter, &self.cancel)?;

        self.transition(RunState::Comparing);
        let n = normalized.len() as u64;
        let total = n * (n - 1) / 2;
        let interval = self.strategy.checkpoint_interval().max(1);
        let span = self.strategy.comparison_span();
        let threshold = self.strategy.threshold();
        let mut completed: u64 = 0;
        let mut matches = Vec::new();
        for i in 0..normalized.len() - 1 {
            self.cancel.check()?;
            for j in i + 1..normalized.len() {
                let comparison = self.strategy.compare(&normalized, i, j);
                if comparison.similarity >= threshold {
                    matches.push(comparison);
                }
                completed += 1;
                if completed % interval == 0 {
                    self.cancel.check()?;
                    let status = self.strategy.checkpoint_status(completed, total);
                    reporter.checkpoint(completed, total, span, status);
                }
            }
        }

        let result = aggregator.finish(
            &normalized,
            matches,
            completed,
            start.elapsed(),
            self.strategy.cache_size(),
        );
        info!(
            algorithm = %algorithm,
            records = result.total_items,
            comparisons = result.total_comparisons,
            duplicates = result.duplicates_found,
            "Compared records in {:.4} secs",
            result.execution_time_ms / 1000.0
        );
        Ok(result)
    }
}
