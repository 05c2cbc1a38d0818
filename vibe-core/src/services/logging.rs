//! Logging service

use crate::models::LogLevel;
use tracing_subscriber::EnvFilter;

/// Crates whose events are shown at the configured level
const CRATE_TARGETS: [&str; 2] = ["vibe_core", "vibe_cli"];

/// Build the filter for `level`; `RUST_LOG` wins when set
pub fn log_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = CRATE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str()))
            .collect();
        EnvFilter::new(directives.join(","))
    })
}

/// Initialize logging with the specified level
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .with_writer(std::io::stderr)
        .try_init()
}

/// Log the outcome of a startup step
pub fn log_startup_event(step: &str, outcome: &str, details: Option<&str>) {
    tracing::info!(
        step = step,
        outcome = outcome,
        details = details.unwrap_or(""),
        "Startup event"
    );
}

/// Log a system error
pub fn log_error(error: &str, context: Option<&str>) {
    tracing::error!(
        error = error,
        context = context.unwrap_or(""),
        "System error occurred"
    );
}
