mod compare;
mod config;
mod detect;
mod error;
mod levenshtein;
mod minhash;
mod normalize;
mod progress;
mod result;
mod shingle;
mod status;
mod strategy;
mod util;
mod worker;

use config::ServiceConfig;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use lazy_static::lazy_static;
use near_dup_service::dto::{DetectionRequest, ResponseFormat, ServiceRequest};
use near_dup_service::error::ServiceError;
use near_dup_service::response::make_response_payload;
use serde_json::{json, Value};
use status::WorkerStatusRegistry;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

lazy_static! {
    static ref STARTED: Instant = Instant::now();
    // Availability of each algorithm, as reported by the health check
    static ref WORKER_STATUS: Arc<WorkerStatusRegistry> = Arc::new(WorkerStatusRegistry::new());
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();
    lazy_static::initialize(&STARTED);
    let config = Arc::new(ServiceConfig::from_env()?);
    info!(timeout_ms = config.timeout.as_millis() as u64, max_records = config.max_records, "starting");
    run(service_fn(move |event| process(event, config.clone()))).await?;
    Ok(())
}

async fn process(event: LambdaEvent<ServiceRequest>, config: Arc<ServiceConfig>) -> Result<Value, Error> {
    let (request, _context) = event.into_parts();
    let result = match request {
        ServiceRequest::Detect(request) => handle_detect(request, &config).await,
        ServiceRequest::Health => Ok(health()),
    };
    make_response_payload(result)
}

async fn handle_detect(request: DetectionRequest, config: &ServiceConfig) -> Result<Value, ServiceError> {
    let start = Instant::now();
    let records = util::load_records(&request).await?;
    info!(
        records = records.len(),
        "Records loaded in {:.4} secs",
        start.elapsed().as_secs_f64()
    );
    if records.len() > config.max_records {
        return Err(ServiceError::bad_request(format!(
            "Dataset too large. Please limit to {} records or less.",
            config.max_records
        )));
    }
    let plans = config::plan_strategies(&request)?;
    let deadline = config.deadline(&request);

    let start = Instant::now();
    let events = detect::collect_events(detect::run_detection(
        records,
        plans,
        Some(deadline),
        WORKER_STATUS.clone(),
    ))
    .await;
    debug_assert!(events.last().is_some_and(detect::DetectionEvent::is_terminal));
    info!(
        events = events.len(),
        "Detection completed in {:.4} secs",
        start.elapsed().as_secs_f64()
    );

    match request.format {
        ResponseFormat::Json => Ok(json!({ "events": events })),
        ResponseFormat::Sse => {
            let stream = events
                .iter()
                .map(detect::sse_frame)
                .collect::<Result<String, _>>()
                .map_err(ServiceError::internal_server_error)?;
            Ok(Value::String(stream))
        }
    }
}

fn health() -> Value {
    json!({
        "status": "healthy",
        "workers": WORKER_STATUS.snapshot(),
        "uptime": STARTED.elapsed().as_secs_f64(),
    })
}
