use crate::compare::PairwiseComparator;
use crate::error::DetectionError;
use crate::levenshtein::EditDistanceStrategy;
use crate::minhash::JaccardStrategy;
use crate::progress::{CancelToken, ProgressReporter, WorkerEvent};
use crate::strategy::{SimilarityStrategy, StrategyConfig};
use near_dup_service::dto::{Algorithm, Record};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// The receiving end of one running algorithm.
pub struct WorkerHandle {
    pub algorithm: Algorithm,
    pub events: UnboundedReceiver<WorkerEvent>,
    pub cancel: CancelToken,
    pub task: JoinHandle<()>,
}

///
/// Starts `config` over `records` on the blocking pool. The worker shares
/// nothing with its caller except the records and its event channel; its hash
/// family or distance cache lives and dies inside the task.
///
pub fn spawn_worker(records: Arc<[Record]>, config: StrategyConfig) -> WorkerHandle {
    let algorithm = config.algorithm();
    let (sender, events) = unbounded_channel();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || {
        let reporter = ProgressReporter::new(algorithm, sender);
        match config {
            StrategyConfig::Jaccard(params) => {
                execute(JaccardStrategy::new(params), &records, reporter, worker_cancel)
            }
            StrategyConfig::EditDistance(params) => {
                execute(EditDistanceStrategy::new(params), &records, reporter, worker_cancel)
            }
        }
    });
    WorkerHandle {
        algorithm,
        events,
        cancel,
        task,
    }
}

fn execute<S: SimilarityStrategy>(
    strategy: S,
    records: &[Record],
    mut reporter: ProgressReporter,
    cancel: CancelToken,
) {
    let algorithm = reporter.algorithm();
    let mut comparator = PairwiseComparator::new(strategy, cancel);
    match comparator.run(records, &mut reporter) {
        Ok(result) => reporter.complete(result),
        Err(DetectionError::Cancelled) => debug!(algorithm = %algorithm, "worker cancelled"),
        Err(err) => {
            error!(algorithm = %algorithm, error = %err, "worker failed");
            reporter.fail(err);
        }
    }
}
