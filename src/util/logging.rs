//! Logging initialization.

use crate::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set and parses.
/// Check results carry structured fields (`service`, `error`, `duration_ms`),
/// so the JSON format is the one to use when logs are shipped somewhere.
/// Logs go to stderr; stdout is reserved for `--once` report output.
pub fn init_logging(level: &str, format: &LogFormat) {
    let filter = build_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty => {
            registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so only
    // the filter construction is exercised here
    #[test]
    fn test_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let _ = build_filter(level);
        }
    }

    #[test]
    fn test_filter_falls_back_on_garbage() {
        let _ = build_filter("[[not a directive");
    }
}
