//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`MUXCREW_ROOT`, `MUXCREW_SESSION`,
//!    `MUXCREW_EXEC_TIMEOUT_MS`, `MUXCREW_DELIVERY`, `MUXCREW_TMUX_SOCKET`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./muxcrew.toml in the current directory
//! 4. $XDG_CONFIG_HOME/muxcrew/muxcrew.toml (or ~/.config/muxcrew/muxcrew.toml)
//! 5. Built-in defaults

use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::debug;

mod defaults;
mod types;

use defaults::{APP_DIR, CONFIG_FILE_NAME};
pub use types::{Config, DeliveryMode, DisplayConfig, MailboxConfig, TerminalConfig, TmuxConfig};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ConfigSource {
    Explicit(PathBuf),
    Local,
    Global(PathBuf),
    BuiltInDefaults,
}

impl ConfigSource {
    fn describe(&self) -> String {
        match self {
            Self::Explicit(path) | Self::Global(path) => path.display().to_string(),
            Self::Local => CONFIG_FILE_NAME.to_string(),
            Self::BuiltInDefaults => "built-in defaults".to_string(),
        }
    }
}

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<Config, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (config_text, source) =
        read_config_text_with_sources(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&config_text)?;
    apply_env_overrides(&mut config, &env_lookup)?;
    validate(&config)?;
    debug!(source = %source.describe(), "configuration loaded");
    Ok(config)
}

fn read_config_text_with_sources<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }

    if let Ok(text) = read_file(Path::new(CONFIG_FILE_NAME)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join(APP_DIR).join(CONFIG_FILE_NAME);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }

    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

fn apply_env_overrides<FEnv>(config: &mut Config, env_lookup: &FEnv) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    let env = |name: &str| env_lookup(name).and_then(|value| normalized_string(&value));

    if let Some(root) = env("MUXCREW_ROOT") {
        config.mailbox.root = Some(PathBuf::from(root));
    }
    if let Some(session) = env("MUXCREW_SESSION") {
        config.tmux.default_session = session;
    }
    if let Some(socket) = env("MUXCREW_TMUX_SOCKET") {
        config.tmux.socket = Some(socket);
    }
    if let Some(timeout) = env("MUXCREW_EXEC_TIMEOUT_MS") {
        config.terminal.exec_timeout_ms = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid MUXCREW_EXEC_TIMEOUT_MS value `{timeout}`: expected positive integer milliseconds"
            ))
        })?;
    }
    if let Some(mode) = env("MUXCREW_DELIVERY") {
        config.mailbox.delivery = mode
            .parse()
            .map_err(|e: String| ConfigError::Invalid(format!("MUXCREW_DELIVERY: {e}")))?;
    }
    Ok(())
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.terminal.exec_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "terminal.exec_timeout_ms must be greater than zero".into(),
        ));
    }
    let session = config.tmux.default_session.trim();
    if session.is_empty() || session.contains([':', '.']) {
        return Err(ConfigError::Invalid(format!(
            "tmux.default_session `{session}` must be non-empty without `:` or `.`"
        )));
    }
    Ok(())
}

fn normalized_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}

impl Config {
    /// State root for mailboxes, workers and leases, with `~/` expanded.
    ///
    /// Defaults to `~/.local/state/muxcrew`, or a temp-dir fallback when no
    /// home directory is known.
    pub fn state_root(&self) -> PathBuf {
        match &self.mailbox.root {
            Some(root) => expand_home(root),
            None => dirs::state_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
