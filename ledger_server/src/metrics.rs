//! Prometheus metrics for ledger health and provider traffic.
//!
//! Metrics are exposed in Prometheus text format on a separate listener.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **Ledger Metrics**: Applied transactions, holds
//! - **Provider Metrics**: Replays, parameter mismatches, signature failures, sportsbook requests
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ledger_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/casino/onewallet", 200);
//! metrics::ledger_transactions_total("casino", "debit");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Increment applied ledger transactions, labelled by source and operation.
pub fn ledger_transactions_total(source: &str, operation: &str) {
    metrics::counter!("ledger_transactions_total",
        "source" => source.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Increment hold lifecycle events (`created`, `released`, `executed`).
pub fn holds_total(event: &'static str) {
    metrics::counter!("holds_total", "event" => event).increment(1);
}

// ============================================================================
// Provider Metrics
// ============================================================================

/// Increment idempotent replays (`exact` or `semantic`).
pub fn replays_total(kind: &'static str) {
    metrics::counter!("replays_total", "kind" => kind).increment(1);
}

/// Increment rejected replays whose parameters diverged.
pub fn parameter_mismatches_total() {
    metrics::counter!("parameter_mismatches_total").increment(1);
}

/// Increment inbound requests with a bad signature.
pub fn signature_failures_total() {
    metrics::counter!("signature_failures_total").increment(1);
}

/// Increment provider failures, labelled by protocol and error kind.
pub fn provider_errors_total(protocol: &'static str, kind: &str) {
    metrics::counter!("provider_errors_total",
        "protocol" => protocol,
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Increment sportsbook requests of any operation, labelled by outcome.
pub fn sportsbook_requests_total(operation: &str, success: bool) {
    metrics::counter!("sportsbook_requests_total",
        "operation" => operation.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}
