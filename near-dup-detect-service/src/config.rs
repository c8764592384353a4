use crate::error::DetectionError;
use crate::strategy::{EditDistanceParams, JaccardParams, StrategyConfig};
use near_dup_service::dto::{Algorithm, DetectionRequest};
use near_dup_service::error::ServiceError;
use near_dup_service::util::env_or;
use std::time::Duration;

/// Process-level settings read once from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Deadline applied to each algorithm when the request sets none.
    pub timeout: Duration,
    /// Largest dataset the service accepts.
    pub max_records: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            timeout: Duration::from_millis(23_000),
            max_records: 1_000,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let defaults = Self::default();
        Ok(ServiceConfig {
            timeout: Duration::from_millis(env_or(
                "DETECTION_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
            max_records: env_or("MAX_RECORDS", defaults.max_records)?,
        })
    }

    pub fn deadline(&self, request: &DetectionRequest) -> Duration {
        request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.timeout)
    }
}

fn check_threshold(threshold: f64) -> Result<f64, DetectionError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(DetectionError::input(format!(
            "threshold must be between 0 and 1, got {threshold}"
        )))
    }
}

fn check_positive(name: &str, value: usize) -> Result<usize, DetectionError> {
    if value == 0 {
        Err(DetectionError::input(format!("{name} must be positive")))
    } else {
        Ok(value)
    }
}

///
/// Resolves the strategies a request asks for, layering per-algorithm
/// options over the shared threshold over the defaults.
///
pub fn plan_strategies(request: &DetectionRequest) -> Result<Vec<StrategyConfig>, DetectionError> {
    request
        .algorithm
        .algorithms()
        .into_iter()
        .map(|algorithm| match algorithm {
            Algorithm::Minhash => {
                let defaults = JaccardParams::default();
                let options = request.minhash.clone().unwrap_or_default();
                Ok(StrategyConfig::Jaccard(JaccardParams {
                    threshold: check_threshold(
                        options.threshold.or(request.threshold).unwrap_or(defaults.threshold),
                    )?,
                    num_perm: check_positive("numPerm", options.num_perm.unwrap_or(defaults.num_perm))?,
                    shingle_size: check_positive(
                        "shingleSize",
                        options.shingle_size.unwrap_or(defaults.shingle_size),
                    )?,
                    result_cap: options.result_cap.unwrap_or(defaults.result_cap),
                    seed: None,
                }))
            }
            Algorithm::Levenshtein => {
                let defaults = EditDistanceParams::default();
                let options = request.levenshtein.clone().unwrap_or_default();
                Ok(StrategyConfig::EditDistance(EditDistanceParams {
                    threshold: check_threshold(
                        options.threshold.or(request.threshold).unwrap_or(defaults.threshold),
                    )?,
                    result_cap: options.result_cap.unwrap_or(defaults.result_cap),
                    cache_capacity: options.cache_capacity.or(defaults.cache_capacity),
                }))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_dup_service::dto::{AlgorithmSelection, LevenshteinOptions, MinHashOptions};

    #[test]
    fn test_defaults_per_algorithm() {
        let plans = plan_strategies(&DetectionRequest::default()).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].threshold(), 0.7);
        assert_eq!(plans[1].threshold(), 0.8);
        match &plans[0] {
            StrategyConfig::Jaccard(p) => {
                assert_eq!(p.num_perm, 64);
                assert_eq!(p.shingle_size, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_shared_threshold_and_overrides() {
        let request = DetectionRequest {
            threshold: Some(0.9),
            levenshtein: Some(LevenshteinOptions {
                threshold: Some(0.6),
                ..Default::default()
            }),
            ..Default::default()
        };
        let plans = plan_strategies(&request).unwrap();
        assert_eq!(plans[0].threshold(), 0.9);
        assert_eq!(plans[1].threshold(), 0.6);
    }

    #[test]
    fn test_selection_limits_plans() {
        let request = DetectionRequest {
            algorithm: AlgorithmSelection::Levenshtein,
            ..Default::default()
        };
        let plans = plan_strategies(&request).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].algorithm(), Algorithm::Levenshtein);
    }

    #[test]
    fn test_invalid_options_are_input_errors() {
        let request = DetectionRequest {
            threshold: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(plan_strategies(&request), Err(DetectionError::Input(_))));
        let request = DetectionRequest {
            minhash: Some(MinHashOptions {
                num_perm: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(plan_strategies(&request), Err(DetectionError::Input(_))));
    }

    #[test]
    fn test_request_timeout_overrides_config() {
        let config = ServiceConfig::default();
        let mut request = DetectionRequest::default();
        assert_eq!(config.deadline(&request), Duration::from_secs(23));
        request.timeout_ms = Some(500);
        assert_eq!(config.deadline(&request), Duration::from_millis(500));
    }
}
