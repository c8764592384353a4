use crate::error::DetectionError;
use crate::result::ProcessingResult;
use near_dup_service::dto::Algorithm;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub algorithm: Algorithm,
    pub progress: u8,
    pub status: String,
}

/// Message sent from a worker to whoever supervises it. `Complete` and
/// `Failed` are terminal: nothing follows them on the same channel.
#[derive(Debug)]
pub enum WorkerEvent {
    Progress(ProgressEvent),
    Complete(Box<ProcessingResult>),
    Failed(DetectionError),
}

/// Shared flag the supervisor raises to stop a worker at its next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), DetectionError> {
        if self.is_cancelled() {
            Err(DetectionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

///
/// Maps `completed / total` into the `span` sub-range of the progress bar.
/// An empty phase counts as finished.
///
pub fn scaled_progress(completed: u64, total: u64, span: (u8, u8)) -> u8 {
    let (start, end) = span;
    if total == 0 {
        return end;
    }
    let fraction = (completed.min(total) as f64) / (total as f64);
    (start as f64 + fraction * (end.saturating_sub(start)) as f64).round() as u8
}

///
/// Emits the events of one worker. Percentages never go backwards and
/// sending never blocks: an event for a supervisor that has gone away is
/// dropped.
///
pub struct ProgressReporter {
    algorithm: Algorithm,
    sender: UnboundedSender<WorkerEvent>,
    last: u8,
}

impl ProgressReporter {
    pub fn new(algorithm: Algorithm, sender: UnboundedSender<WorkerEvent>) -> Self {
        ProgressReporter {
            algorithm,
            sender,
            last: 0,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn report<S: Into<String>>(&mut self, progress: u8, status: S) {
        let progress = progress.clamp(self.last, 100);
        self.last = progress;
        let _ = self.sender.send(WorkerEvent::Progress(ProgressEvent {
            algorithm: self.algorithm,
            progress,
            status: status.into(),
        }));
    }

    pub fn checkpoint<S: Into<String>>(&mut self, completed: u64, total: u64, span: (u8, u8), status: S) {
        self.report(scaled_progress(completed, total, span), status);
    }

    pub fn complete(mut self, result: ProcessingResult) {
        let status = format!("{} processing complete!", self.algorithm.label());
        self.report(100, status);
        let _ = self.sender.send(WorkerEvent::Complete(Box::new(result)));
    }

    pub fn fail(self, err: DetectionError) {
        let _ = self.sender.send(WorkerEvent::Failed(err));
    }
}
