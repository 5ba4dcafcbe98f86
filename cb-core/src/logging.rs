//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr so command output on stdout stays clean;
//! the file layer rotates daily and can emit JSON.

use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::CbResult;

/// Directives appended to every filter so transport crates stay quiet.
const QUIET_DEPENDENCIES: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn", "hyper=warn", "reqwest=warn"];

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Build an `EnvFilter` from a level or directive string, falling back to `info`.
fn build_filter(level: &str) -> EnvFilter {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Installs a compact stderr layer and a daily-rotated file layer
/// (`chatbase.log` in `log_dir`). `settings.level` accepts any `EnvFilter`
/// directive string such as `"debug"` or `"cb_realtime=trace,info"`.
pub fn init_logging(settings: &LoggingConfig, log_dir: &Path) -> CbResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "chatbase.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    if settings.json_output {
        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(build_filter(&settings.level))
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(build_filter(&settings.level))
            .with(console_layer)
            .with(file_layer)
            .init();
    }

    tracing::info!(
        "logging initialized at level={}, dir={}",
        settings.level,
        log_dir.display()
    );

    Ok(LogGuard { _guard: guard })
}

/// Initialize a console-only logger for tests and one-shot commands.
/// Subsequent calls are no-ops.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_does_not_panic() {
        init_console_logging("debug");
        init_console_logging("trace");
    }
}
