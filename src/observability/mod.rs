pub mod token_counter;

use tracing_subscriber::EnvFilter;

use crate::config::{FeaturesConfig, LogFormat};

/// Map a config log level to an `EnvFilter` directive; `None` means logging is off.
fn filter_directive(log_level: &str) -> Option<String> {
    match log_level.to_uppercase().as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        other => Some(other.to_string()),
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_tracing(features: &FeaturesConfig) {
    let Some(directive) = filter_directive(&features.log_level) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match features.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }
}

/// Log token usage for a completed request, computing duration from start time.
pub fn log_request_complete(
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    start_time: std::time::Instant,
) {
    token_counter::log_request_usage(model, input_tokens, output_tokens, start_time.elapsed());
}
