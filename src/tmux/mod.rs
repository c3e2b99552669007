//! Multiplexer capability and the session/window/pane data model.
//!
//! Core components never shell out to tmux directly; they receive a
//! [`Multiplexer`] handle so tests can substitute an in-memory backend.

pub mod backend;
pub mod process;

use crate::error::MuxError;
use async_trait::async_trait;
use serde::Serialize;

pub use backend::TmuxBackend;

/// A multiplexer session. Serializes to `{id, name, windows, attached}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    /// Number of windows in the session.
    pub windows: usize,
    pub attached: bool,
}

/// A window inside exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: String,
    pub name: String,
    pub session_id: String,
    /// Position within the session; lower is older for same-named windows.
    pub index: u32,
    pub active: bool,
}

/// A pane inside exactly one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    pub id: String,
    pub window_id: String,
    pub index: u32,
}

/// Cursor position of a pane, expressed against its scrollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneCursor {
    /// Lines currently held in history above the visible area.
    pub history_size: u64,
    /// Cursor row within the visible area.
    pub cursor_y: u64,
    /// Cursor column; non-zero when the last line has no trailing newline.
    pub cursor_x: u64,
}

/// `display-message -p` format read back by [`PaneCursor::parse`].
pub const CURSOR_FORMAT: &str = "#{history_size} #{cursor_y} #{cursor_x}";

impl PaneCursor {
    /// Line number counted from the oldest history line.
    pub fn absolute_line(&self) -> u64 {
        self.history_size + self.cursor_y
    }

    /// Parse the whitespace separated fields of [`CURSOR_FORMAT`].
    pub fn parse(text: &str) -> Option<Self> {
        let mut cols = text.split_whitespace();
        let history_size = cols.next()?.parse::<u64>().ok()?;
        let cursor_y = cols.next()?.parse::<u64>().ok()?;
        let cursor_x = cols.next()?.parse::<u64>().ok()?;
        Some(Self {
            history_size,
            cursor_y,
            cursor_x,
        })
    }
}

/// Primitive operations the core needs from a terminal multiplexer.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// All sessions. An absent server yields an empty list.
    async fn list_sessions(&self) -> Result<Vec<Session>, MuxError>;
    /// Create a detached session. Fails with `CreationFailed` on conflict.
    async fn create_session(&self, name: &str) -> Result<Session, MuxError>;
    async fn list_windows(&self, session_id: &str) -> Result<Vec<Window>, MuxError>;
    async fn create_window(&self, session_id: &str, name: &str) -> Result<Window, MuxError>;
    async fn kill_window(&self, window_id: &str) -> Result<(), MuxError>;
    async fn list_panes(&self, window_id: &str) -> Result<Vec<Pane>, MuxError>;
    /// Every pane on the server, across sessions.
    async fn list_all_panes(&self) -> Result<Vec<Pane>, MuxError>;
    /// Name of the session the caller is attached to, if any.
    async fn current_session(&self) -> Result<Option<String>, MuxError>;
    async fn pane_cursor(&self, pane_id: &str) -> Result<PaneCursor, MuxError>;
    /// Type `text` literally into the pane, then press Enter.
    async fn send_line(&self, pane_id: &str, text: &str) -> Result<(), MuxError>;
    /// Capture lines `start..=end` (visible-area relative, negative = history).
    async fn capture(&self, pane_id: &str, start: i64, end: i64) -> Result<String, MuxError>;
    /// Block until `channel` is signalled.
    async fn wait_for(&self, channel: &str) -> Result<(), MuxError>;
    /// Read and delete a named paste buffer.
    async fn take_buffer(&self, name: &str) -> Result<Option<String>, MuxError>;
    /// Flash a status-line message on every client attached to the pane's
    /// session, without touching pane contents. Fails with `NotFound` when no
    /// client is attached, since nobody would see it.
    async fn display_message(&self, pane_id: &str, text: &str) -> Result<(), MuxError>;
}
