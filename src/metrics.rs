/// Metrics and telemetry for the bookstore catalog
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Record store operation times
/// - Aggregation pipeline and geospatial query counts

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, Encoder, Gauge,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Record Store Metrics ==========

    /// Record store operations by operation type and collection
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of record store operations",
        &["operation", "collection"]
    )
    .unwrap();

    /// Record store operation duration in seconds
    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Record store operation latencies in seconds",
        &["operation", "collection"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // ========== Query Metrics ==========

    /// Aggregation pipelines executed, by pipeline name
    pub static ref AGGREGATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aggregations_total",
        "Total number of aggregation pipelines executed",
        &["pipeline"]
    )
    .unwrap();

    /// Geospatial queries executed, by predicate
    pub static ref GEO_QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "geo_queries_total",
        "Total number of geospatial queries",
        &["predicate"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();

    static ref STARTED_AT: Instant = Instant::now();
}

/// Mark process start; uptime is measured from the first call
pub fn init() {
    lazy_static::initialize(&STARTED_AT);
}

/// Seconds since `init`
pub fn uptime_seconds() -> f64 {
    let uptime = STARTED_AT.elapsed().as_secs_f64();
    UPTIME_SECONDS.set(uptime);
    uptime
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    uptime_seconds();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "metrics_encoding_failed");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a record store operation
pub fn record_store_operation(operation: &str, collection: &str, duration: f64) {
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection])
        .inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);
}

/// Record an aggregation pipeline run
pub fn record_aggregation(pipeline: &str) {
    AGGREGATIONS_TOTAL.with_label_values(&[pipeline]).inc();
}

/// Record a geospatial query
pub fn record_geo_query(predicate: &str) {
    GEO_QUERIES_TOTAL.with_label_values(&[predicate]).inc();
}

/// Middleware recording request counts and latencies per route template
pub async fn track_http_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // Route templates keep label cardinality bounded (`/books/:id`, not `/books/17`)
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
