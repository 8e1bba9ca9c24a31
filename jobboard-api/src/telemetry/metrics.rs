//! Prometheus Metrics Definitions
//!
//! Defines the job board metrics with their labels and types, and exposes
//! a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Store operation latency buckets (seconds)
const STORE_LATENCY_BUCKETS: &[f64] =
    &[0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<JobBoardMetrics>> = Lazy::new(JobBoardMetrics::new);

fn registration_failed(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Container for all job board metrics.
#[derive(Clone)]
pub struct JobBoardMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cached reads - labels: operation, result (hit/miss)
    pub cache_reads_total: CounterVec,

    /// Write-side invalidations - labels: status (success/failure)
    pub cache_invalidations_total: CounterVec,

    /// Entries removed from the cache - labels: reason (invalidated/expired)
    pub cache_evictions_total: CounterVec,

    /// Store operation counter - labels: operation, status
    pub store_operations_total: CounterVec,

    /// Store operation duration histogram - labels: operation
    pub store_operation_duration_seconds: HistogramVec,

    /// Background events handled - labels: kind, status (success/retry/failure)
    pub events_total: CounterVec,

    /// Identity-provider webhooks received - labels: status (accepted/rejected)
    pub webhooks_received_total: CounterVec,
}

impl JobBoardMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "jobboard_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_failed("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "jobboard_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("http_request_duration_seconds", e))?,

            cache_reads_total: register_counter_vec!(
                "jobboard_cache_reads_total",
                "Cached reads by outcome",
                &["operation", "result"]
            )
            .map_err(|e| registration_failed("cache_reads_total", e))?,

            cache_invalidations_total: register_counter_vec!(
                "jobboard_cache_invalidations_total",
                "Write-side cache invalidations",
                &["status"]
            )
            .map_err(|e| registration_failed("cache_invalidations_total", e))?,

            cache_evictions_total: register_counter_vec!(
                "jobboard_cache_evictions_total",
                "Cache entries removed",
                &["reason"]
            )
            .map_err(|e| registration_failed("cache_evictions_total", e))?,

            store_operations_total: register_counter_vec!(
                "jobboard_store_operations_total",
                "Total number of store operations",
                &["operation", "status"]
            )
            .map_err(|e| registration_failed("store_operations_total", e))?,

            store_operation_duration_seconds: register_histogram_vec!(
                "jobboard_store_operation_duration_seconds",
                "Store operation duration in seconds",
                &["operation"],
                STORE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("store_operation_duration_seconds", e))?,

            events_total: register_counter_vec!(
                "jobboard_events_total",
                "Background events handled",
                &["kind", "status"]
            )
            .map_err(|e| registration_failed("events_total", e))?,

            webhooks_received_total: register_counter_vec!(
                "jobboard_webhooks_received_total",
                "Identity-provider webhooks received",
                &["status"]
            )
            .map_err(|e| registration_failed("webhooks_received_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_cache_read(&self, operation: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_reads_total
            .with_label_values(&[operation, result])
            .inc();
    }

    /// Record one write's invalidation and how many entries it evicted.
    pub fn record_invalidation(&self, success: bool, evicted: u64) {
        let status = if success { "success" } else { "failure" };
        self.cache_invalidations_total
            .with_label_values(&[status])
            .inc();
        if evicted > 0 {
            self.cache_evictions_total
                .with_label_values(&["invalidated"])
                .inc_by(evicted as f64);
        }
    }

    pub fn record_expired(&self, entries: u64) {
        if entries > 0 {
            self.cache_evictions_total
                .with_label_values(&["expired"])
                .inc_by(entries as f64);
        }
    }

    /// Record a store operation.
    pub fn record_store_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.store_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn record_event(&self, kind: &str, status: &str) {
        self.events_total.with_label_values(&[kind, status]).inc();
    }

    pub fn record_webhook(&self, accepted: bool) {
        let status = if accepted { "accepted" } else { "rejected" };
        self.webhooks_received_total
            .with_label_values(&[status])
            .inc();
    }
}

/// Run `f` against the global metrics if they registered.
pub fn with_metrics(f: impl FnOnce(&JobBoardMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn metrics() -> Result<&'static JobBoardMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = metrics()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        metrics()?.record_http_request("GET", "/api/v1/job-listings", 200, 0.015);
        Ok(())
    }

    #[test]
    fn test_cache_counters() -> Result<(), String> {
        let metrics = metrics()?;
        let before = metrics
            .cache_reads_total
            .with_label_values(&["test_op", "hit"])
            .get();
        metrics.record_cache_read("test_op", true);
        metrics.record_cache_read("test_op", false);
        let after = metrics
            .cache_reads_total
            .with_label_values(&["test_op", "hit"])
            .get();
        assert!((after - before - 1.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_invalidation_and_expiry() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_invalidation(true, 3);
        metrics.record_invalidation(false, 0);
        metrics.record_expired(2);
        assert!(
            metrics
                .cache_evictions_total
                .with_label_values(&["invalidated"])
                .get()
                >= 3.0
        );
        Ok(())
    }

    #[test]
    fn test_store_and_event_metrics() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_store_operation("job_listing_get", true, 0.005);
        metrics.record_store_operation("application_insert", false, 0.010);
        metrics.record_event("user.created", "success");
        metrics.record_webhook(false);
        Ok(())
    }
}
