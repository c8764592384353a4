use near_dup_service::dto::Algorithm;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub available: bool,
    /// Milliseconds since the Unix epoch of the last successful run.
    pub last_check: u64,
}

///
/// Process-wide availability flags, one per algorithm, reported by the
/// health check. Updated by the orchestrator after each worker finishes.
///
#[derive(Debug)]
pub struct WorkerStatusRegistry {
    workers: Mutex<BTreeMap<Algorithm, WorkerStatus>>,
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl Default for WorkerStatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerStatusRegistry {
    pub fn new() -> Self {
        let now = now_millis();
        let workers = [Algorithm::Minhash, Algorithm::Levenshtein]
            .into_iter()
            .map(|algorithm| {
                (
                    algorithm,
                    WorkerStatus {
                        available: true,
                        last_check: now,
                    },
                )
            })
            .collect();
        WorkerStatusRegistry {
            workers: Mutex::new(workers),
        }
    }

    fn update<F: FnOnce(&mut WorkerStatus)>(&self, algorithm: Algorithm, f: F) {
        let mut workers = self.workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(status) = workers.get_mut(&algorithm) {
            f(status);
        }
    }

    pub fn mark_success(&self, algorithm: Algorithm) {
        self.update(algorithm, |status| {
            status.available = true;
            status.last_check = now_millis();
        });
    }

    pub fn mark_failure(&self, algorithm: Algorithm) {
        self.update(algorithm, |status| status.available = false);
    }

    pub fn snapshot(&self) -> BTreeMap<String, WorkerStatus> {
        let workers = self.workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        workers
            .iter()
            .map(|(algorithm, status)| (algorithm.tag().to_string(), *status))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_workers_start_available() {
        let registry = WorkerStatusRegistry::new();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.values().all(|s| s.available));
    }

    #[test]
    fn test_failure_then_success_restores_availability() {
        let registry = WorkerStatusRegistry::new();
        registry.mark_failure(Algorithm::Levenshtein);
        assert!(!registry.snapshot()["levenshtein"].available);
        assert!(registry.snapshot()["minhash"].available);
        registry.mark_success(Algorithm::Levenshtein);
        assert!(registry.snapshot()["levenshtein"].available);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let registry = WorkerStatusRegistry::new();
        let value = serde_json::to_value(registry.snapshot()).unwrap();
        assert!(value["minhash"]["lastCheck"].is_u64());
        assert_eq!(value["minhash"]["available"], serde_json::json!(true));
    }
}
