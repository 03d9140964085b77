//! Logging setup for binaries and benches
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! whoever embeds it. These helpers install the ones the simulator uses.

use tracing_appender::non_blocking::WorkerGuard;

/// Output format for console logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    /// One JSON object per event
    Json,
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Log JSON events to a daily-rolling file in `log_dir`.
///
/// The returned guard flushes the background writer when dropped; keep it
/// alive for as long as logging is needed.
pub fn init_file_logging(
    log_dir: &str,
    max_files: usize,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("link-reversal")
        .filename_suffix("log")
        .max_log_files(max_files)
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking),
        )
        .with(env_filter());

    // Try to set as global default, but don't fail if already set
    let _ = subscriber.try_init();

    Ok(guard)
}
