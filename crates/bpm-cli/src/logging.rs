//! Subscriber setup: human output on stderr, JSON into the job's `bpm.log`.

use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Installs the global subscriber.
///
/// The stderr layer follows `RUST_LOG` and defaults to warnings. When
/// `diagnostic_log` is given, every info-level event is also appended to it
/// as one JSON object per line.
///
/// # Errors
///
/// Returns an error if the diagnostic log cannot be opened or a subscriber
/// is already installed.
pub fn init(diagnostic_log: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let json_layer = match diagnostic_log {
        Some(path) => {
            let file = bpm_runtime::logs::open_append(path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::INFO),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()?;
    Ok(())
}
