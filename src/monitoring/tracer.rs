/*!
 * Structured Tracing
 * Subscriber setup for the tracing events emitted by the lock primitives
 *
 * Lock events by level:
 * - TRACE: lock table entries created and evicted, reentrant gates acquired
 * - DEBUG: grants, timeouts, releases, reentrant sections unwound
 * - WARN: keyed locks held past the slow-hold threshold
 * - ERROR: bookkeeping violations detected while dropping a handle
 */

use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable enabling JSON output
pub const TRACE_JSON_ENV: &str = "KEYED_RWLOCK_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KEYED_RWLOCK_TRACE_JSON: Enable JSON output (default: false)
///
/// Calling this more than once is harmless; only the first call installs a
/// subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        // JSON output for production/parsing
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        // Human-readable output for development
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}
