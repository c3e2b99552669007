//! Error taxonomy shared by the directory, resolver, engine, and mailbox.

use std::fmt;

// ---------------------------------------------------------------------------
// MuxError
// ---------------------------------------------------------------------------

/// Failures surfaced by core operations.
#[derive(Debug)]
pub enum MuxError {
    /// A named session/window/pane/worker is absent, or went stale before use.
    NotFound(String),
    /// The backend refused to create a requested session or window.
    CreationFailed(String),
    /// The descriptor matched no addressing strategy.
    Unresolvable(String),
    /// Execution exceeded its bound without a completion signal.
    Timeout(String),
    /// A send could not reach a live recipient. The record is still stored.
    DeliveryFailed(String),
    /// Mailbox or registry persistence I/O failure, or a corrupt record.
    StoreFault(String),
    /// The pane already has an outstanding correlation token.
    Busy(String),
    /// The operator interrupted a blocking wait.
    Cancelled,
    /// The multiplexer could not be reached or failed unexpectedly.
    Backend(String),
    /// Caller input was rejected before touching any resource.
    InvalidArguments(String),
}

impl MuxError {
    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::CreationFailed(msg) => write!(f, "creation failed: {msg}"),
            Self::Unresolvable(descriptor) => {
                write!(f, "unresolvable target `{descriptor}`")
            }
            Self::Timeout(msg) => write!(f, "timed out: {msg}"),
            Self::DeliveryFailed(msg) => write!(f, "delivery failed: {msg}"),
            Self::StoreFault(msg) => write!(f, "store fault: {msg}"),
            Self::Busy(pane) => write!(f, "pane {pane} already has a command in flight"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Backend(msg) => write!(f, "backend: {msg}"),
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
        }
    }
}

impl std::error::Error for MuxError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_nonzero_exit_are_worded_differently() {
        let timeout = MuxError::Timeout("echo hi after 5s".into()).to_string();
        assert!(timeout.starts_with("timed out:"), "got: {timeout}");
        assert!(!MuxError::Cancelled.to_string().contains("timed out"));
    }

    #[test]
    fn cancelled_has_distinct_exit_code() {
        assert_eq!(MuxError::Cancelled.exit_code(), 130);
        assert_eq!(MuxError::NotFound("pane %3".into()).exit_code(), 1);
        assert_eq!(MuxError::Unresolvable("x".into()).exit_code(), 1);
    }

    #[test]
    fn unresolvable_mentions_descriptor() {
        assert_eq!(
            MuxError::Unresolvable("a:".into()).to_string(),
            "unresolvable target `a:`"
        );
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let s = ConfigError::from(io_err).to_string();
        assert!(s.starts_with("io:"), "got: {s}");
        assert!(s.contains("file not found"));
    }

    #[test]
    fn config_error_from_toml() {
        let toml_err: toml::de::Error = toml::from_str::<toml::Value>("x = [unclosed").unwrap_err();
        assert!(ConfigError::from(toml_err).to_string().starts_with("toml:"));
    }
}
