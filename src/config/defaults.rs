//! Default configuration constants.

/// Default bound on a synchronous execution wait.
pub(super) const DEFAULT_EXEC_TIMEOUT_MS: u64 = 30_000;
/// Session used for pane-index addressing outside an attached client.
pub(super) const DEFAULT_SESSION: &str = "crew";
/// Directory name used under the config and state roots.
pub(super) const APP_DIR: &str = "muxcrew";
/// Config file name looked up locally and under the config root.
pub(super) const CONFIG_FILE_NAME: &str = "muxcrew.toml";
