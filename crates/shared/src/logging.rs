use std::{env, str::FromStr};

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` selects the filter (defaults to `info`) and `LOG_FORMAT=json`
/// switches the formatter to JSON lines for log shippers.
pub fn configure_logging() -> Result<(), anyhow::Error> {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_str(&filter)?)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stdout);

    let subscriber = if json_output_requested() {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(e) = subscriber {
        warn!(
            "Failed to initialize logging, potentially because we have initialized logging already: {}",
            e
        );
    }

    Ok(())
}

fn json_output_requested() -> bool {
    env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"))
}
