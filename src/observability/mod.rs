mod request_id;
pub mod usage;

pub(crate) use request_id::RequestIdGenerator;
pub use usage::{log_invocation_usage, TokenUsage};

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, WARN, ERROR)
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let tracing_level = match level.as_str() {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    };

    let filter = EnvFilter::try_new(tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO"));

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Log completion of a backend call, computing duration from start time.
pub fn log_invocation_complete(
    route: &str,
    model: Option<&str>,
    usage: Option<&TokenUsage>,
    start_time: std::time::Instant,
) {
    let elapsed = start_time.elapsed();
    match usage {
        Some(usage) => log_invocation_usage(route, model.unwrap_or("-"), usage, elapsed),
        None => tracing::info!(
            route,
            model = model.unwrap_or("-"),
            elapsed_ms = elapsed.as_millis() as u64,
            "invocation completed"
        ),
    }
}
