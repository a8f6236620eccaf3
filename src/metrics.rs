//! Prometheus metrics for import runs

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Histogram: entity import duration (seconds)
    pub static ref IMPORT_DURATION: HistogramVec = register_histogram_vec!(
        "jira_import_entity_duration_seconds",
        "Duration of a single entity import",
        &["entity"],
        vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]
    )
    .expect("Failed to create entity_duration metric");

    /// Counter: records by outcome (inserted, updated, ignored, failed)
    pub static ref RECORDS: CounterVec = register_counter_vec!(
        "jira_import_records_total",
        "Records processed by outcome",
        &["entity", "outcome"]
    )
    .expect("Failed to create records metric");

    /// Counter: HTTP responses by status code
    pub static ref RESPONSES: CounterVec = register_counter_vec!(
        "jira_import_responses_total",
        "Jira API responses by status",
        &["entity", "status"]
    )
    .expect("Failed to create responses metric");

    /// Counter: retried requests
    pub static ref RETRIES: CounterVec = register_counter_vec!(
        "jira_import_retries_total",
        "Page requests retried after a transient failure",
        &["entity"]
    )
    .expect("Failed to create retries metric");

    /// Counter: finished entity runs by result
    pub static ref ENTITY_RUNS: CounterVec = register_counter_vec!(
        "jira_import_entity_runs_total",
        "Entity runs by result",
        &["entity", "result"]
    )
    .expect("Failed to create entity_runs metric");
}

pub fn record_duration(entity: &str, duration_secs: f64) {
    IMPORT_DURATION
        .with_label_values(&[entity])
        .observe(duration_secs);
}

pub fn record_records(entity: &str, outcome: &str, count: usize) {
    if count > 0 {
        RECORDS
            .with_label_values(&[entity, outcome])
            .inc_by(count as f64);
    }
}

pub fn record_response(entity: &str, status: u16) {
    let status = status.to_string();
    RESPONSES
        .with_label_values(&[entity, status.as_str()])
        .inc();
}

pub fn record_retry(entity: &str) {
    RETRIES.with_label_values(&[entity]).inc();
}

/// Record a finished entity run ("ok", "aborted", "skipped")
pub fn record_entity_run(entity: &str, result: &str) {
    ENTITY_RUNS.with_label_values(&[entity, result]).inc();
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::ImportError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::ImportError::Other(format!("Metrics are not UTF-8: {}", e)))
}
