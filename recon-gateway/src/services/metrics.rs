//! Prometheus metrics for recon-gateway.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use service_core::error::AppError;

/// Counter for forwarded calls by endpoint and downstream status.
pub static FORWARD_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recon_gateway_forward_requests_total",
        "Total number of calls forwarded to the reconciliation service",
        &["endpoint", "status"]
    )
    .expect("Failed to register FORWARD_REQUESTS")
});

/// Histogram for downstream round-trip time, body included.
pub static FORWARD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "recon_gateway_forward_duration_seconds",
        "Reconciliation service round-trip duration in seconds",
        &["endpoint"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("Failed to register FORWARD_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recon_gateway_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&FORWARD_REQUESTS);
    Lazy::force(&FORWARD_DURATION);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Metrics are not UTF-8: {}", e)))
}

/// Record a completed forward.
pub fn record_forward(endpoint: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    FORWARD_REQUESTS
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
    FORWARD_DURATION
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
