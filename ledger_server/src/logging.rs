//! Structured logging configuration.
//!
//! Library code logs through the `log` facade; the subscriber installed here
//! bridges those records into `tracing`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Requests slower than this are logged at `warn`
pub const SLOW_REQUEST_MS: u64 = 1000;

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use ledger_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use ledger_server::logging::log_security_event;
///
/// log_security_event(
///     "casino_signature",
///     Some("ping"),
///     Some("192.168.1.1"),
///     "Signature verification failed"
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    request_type: Option<&str>,
    ip_address: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        request_type = request_type,
        ip_address = ip_address,
        "SECURITY: {}",
        message
    );
}

/// Log a completed request, tagged with its request id
///
/// Requests slower than [`SLOW_REQUEST_MS`] are logged at `warn`.
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    if duration_ms > SLOW_REQUEST_MS {
        tracing::warn!(
            request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms,
            "Slow API request"
        );
    } else {
        tracing::info!(
            request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms,
            "API request completed"
        );
    }
}
