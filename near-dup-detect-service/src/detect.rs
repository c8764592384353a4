use crate::error::{DetectionError, ErrorKind};
use crate::progress::{CancelToken, ProgressEvent, WorkerEvent};
use crate::result::ProcessingResult;
use crate::status::{now_millis, WorkerStatusRegistry};
use crate::strategy::StrategyConfig;
use crate::worker::{spawn_worker, WorkerHandle};
use futures::future::try_join_all;
use near_dup_service::dto::{Algorithm, Record};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

/// Final event of a detection run.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TerminalEvent {
    Complete {
        results: BTreeMap<String, ProcessingResult>,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    Error {
        kind: ErrorKind,
        error: String,
    },
}

/// Everything a caller sees from a run: progress from any algorithm, then
/// one terminal event.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DetectionEvent {
    Progress(ProgressEvent),
    Terminal(TerminalEvent),
}

impl DetectionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DetectionEvent::Terminal(_))
    }
}

/// Renders an event as one server-sent-events frame.
pub fn sse_frame(event: &DetectionEvent) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}

///
/// Runs every strategy in `plans` concurrently over `records` and returns the
/// merged event stream. Each algorithm's progress arrives in order; the last
/// event is a single `complete` carrying every result, or a single `error`
/// if any algorithm failed, timed out or vanished.
///
/// ## Arguments
///
/// * `records` - The records to compare.
/// * `plans` - One entry per algorithm to run.
/// * `deadline` - Per-algorithm time limit; the worker is cancelled when it expires (optional).
/// * `status` - Registry updated with the outcome of each algorithm.
///
pub fn run_detection(
    records: Vec<Record>,
    plans: Vec<StrategyConfig>,
    deadline: Option<Duration>,
    status: Arc<WorkerStatusRegistry>,
) -> UnboundedReceiver<DetectionEvent> {
    let (out, events) = unbounded_channel();
    tokio::spawn(supervise_run(records.into(), plans, deadline, status, out));
    events
}

/// Collects a run's events until its channel closes.
pub async fn collect_events(mut events: UnboundedReceiver<DetectionEvent>) -> Vec<DetectionEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }
    collected
}

async fn supervise_run(
    records: Arc<[Record]>,
    plans: Vec<StrategyConfig>,
    deadline: Option<Duration>,
    status: Arc<WorkerStatusRegistry>,
    out: UnboundedSender<DetectionEvent>,
) {
    let mut cancels = Vec::with_capacity(plans.len());
    let mut supervisors = Vec::with_capacity(plans.len());
    for plan in plans {
        let algorithm = plan.algorithm();
        let _ = out.send(DetectionEvent::Progress(ProgressEvent {
            algorithm,
            progress: 0,
            status: format!("Starting {} processing...", algorithm.label()),
        }));
        let handle = spawn_worker(records.clone(), plan);
        cancels.push(handle.cancel.clone());
        supervisors.push(supervise_worker(handle, deadline, out.clone()));
    }

    let terminal = match try_join_all(supervisors).await {
        Ok(outcomes) => {
            let mut results = BTreeMap::new();
            for (algorithm, result) in outcomes {
                status.mark_success(algorithm);
                results.insert(algorithm.tag().to_string(), result);
            }
            info!(algorithms = results.len(), "detection complete");
            TerminalEvent::Complete {
                results,
                timestamp: now_millis(),
            }
        }
        Err((algorithm, err)) => {
            cancels.iter().for_each(CancelToken::cancel);
            if !matches!(err, DetectionError::Timeout { .. }) {
                status.mark_failure(algorithm);
            }
            warn!(algorithm = %algorithm, error = %err, "detection failed");
            TerminalEvent::Error {
                kind: err.kind(),
                error: err.to_string(),
            }
        }
    };
    let _ = out.send(DetectionEvent::Terminal(terminal));
}

///
/// Forwards one worker's progress to `out` and resolves with its result. The
/// worker is cancelled if `deadline` passes first.
///
async fn supervise_worker(
    handle: WorkerHandle,
    deadline: Option<Duration>,
    out: UnboundedSender<DetectionEvent>,
) -> Result<(Algorithm, ProcessingResult), (Algorithm, DetectionError)> {
    let WorkerHandle {
        algorithm,
        events,
        cancel,
        task,
    } = handle;
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, forward(algorithm, events, out)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                cancel.cancel();
                Err(DetectionError::Timeout { algorithm, limit })
            }
        },
        None => forward(algorithm, events, out).await,
    };
    if let Err(DetectionError::AbnormalTermination { .. }) = &outcome {
        if let Err(join_err) = task.await {
            error!(algorithm = %algorithm, error = %join_err, "worker task died");
        }
    }
    outcome
        .map(|result| (algorithm, result))
        .map_err(|err| (algorithm, err))
}

async fn forward(
    algorithm: Algorithm,
    mut events: UnboundedReceiver<WorkerEvent>,
    out: UnboundedSender<DetectionEvent>,
) -> Result<ProcessingResult, DetectionError> {
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Progress(progress) => {
                let _ = out.send(DetectionEvent::Progress(progress));
            }
            WorkerEvent::Complete(result) => return Ok(*result),
            WorkerEvent::Failed(err) => return Err(err),
        }
    }
    Err(DetectionError::AbnormalTermination { algorithm })
}
