use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with a console layer and a daily rolling log file.
///
/// - Console (stdout): `RUST_LOG` if set, otherwise INFO and above
/// - File (`./logs/yamdb_api.log.<date>`): DEBUG and above, no ANSI colors
///
/// The returned guard owns the background writer of the file layer. Keep it
/// alive for the whole program (`let _guard = init_tracing();`), dropping it
/// flushes buffered lines.
pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = rolling::daily("./logs", "yamdb_api.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
