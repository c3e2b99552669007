//! Diagnostic logging setup.
//!
//! Logs go to stderr so stdout stays reserved for command results. The filter
//! comes from `MUXCREW_LOG` (standard `EnvFilter` syntax) and defaults to
//! `warn`.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "MUXCREW_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(color: bool) {
    let filter = filter_from(std::env::var(LOG_ENV).ok().as_deref());
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .try_init();
}

fn filter_from(directive: Option<&str>) -> EnvFilter {
    directive
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
