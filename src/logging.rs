/// Tracing setup shared by the `intentrank` and `benchmark` binaries.
///
/// Everything goes to stderr: stdout carries rankings, comparison tables and JSON
/// reports. `log_format` picks pretty or JSON output (auto chooses by whether stderr
/// is a terminal). A JSON file sink can be added with `log_file`.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{Config, LogFormat};

/// Whether stderr output should be JSON for `format`.
fn json_on_stderr(format: LogFormat, stderr_is_terminal: bool) -> bool {
    match format {
        LogFormat::Auto => !stderr_is_terminal,
        LogFormat::Pretty => false,
        LogFormat::Json => true,
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `log_level`.
///
/// A second call is a no-op with a warning, so tests and embedders can call it freely.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let terminal = std::io::stderr().is_terminal();
    let stderr_layer = if json_on_stderr(config.log_format, terminal) {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(terminal)
            .boxed()
    };

    let (file_layer, file_error) = match config.log_file.as_deref() {
        None => (None, None),
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .json()
                        .boxed(),
                ),
                None,
            ),
            Err(e) => (None, Some((path.to_string(), e))),
        },
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        tracing::warn!(error = %e, "Logging already initialized");
        return;
    }

    if let Some((path, e)) = file_error {
        tracing::warn!(path = %path, error = %e, "Could not open log file, logging to stderr only");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection() {
        assert!(!json_on_stderr(LogFormat::Auto, true));
        assert!(json_on_stderr(LogFormat::Auto, false));
        assert!(!json_on_stderr(LogFormat::Pretty, false));
        assert!(json_on_stderr(LogFormat::Json, true));
    }
}
