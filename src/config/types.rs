//! Configuration data model.
//!
//! Struct/enum definitions plus default values. Source precedence and env
//! overrides live in `config::mod`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::defaults::{DEFAULT_EXEC_TIMEOUT_MS, DEFAULT_SESSION};

/// How a stored message is pushed to a live worker pane.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Status-line notice; pane contents are untouched.
    #[default]
    Notify,
    /// Type the message into the pane as a line of input.
    Keys,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "notify" => Ok(Self::Notify),
            "keys" => Ok(Self::Keys),
            other => Err(format!("unknown delivery mode `{other}` (expected notify or keys)")),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub terminal: TerminalConfig,
    pub tmux: TmuxConfig,
    pub mailbox: MailboxConfig,
    pub display: DisplayConfig,
}

/// Terminal behavior: the source of the default execution timeout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub exec_timeout_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            exec_timeout_ms: DEFAULT_EXEC_TIMEOUT_MS,
        }
    }
}

impl TerminalConfig {
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmuxConfig {
    pub default_session: String,
    /// Named server socket (`tmux -L`); the default server when unset.
    pub socket: Option<String>,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            default_session: DEFAULT_SESSION.to_string(),
            socket: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// State root holding mailboxes, the worker registry and pane leases.
    pub root: Option<PathBuf>,
    pub delivery: DeliveryMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}
