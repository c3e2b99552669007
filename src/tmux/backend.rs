//! `Multiplexer` implementation over the `tmux` command line.

use async_trait::async_trait;
use tracing::debug;

use super::process::{ensure_success, run_process, ProcessOutput};
use super::{Multiplexer, Pane, PaneCursor, Session, Window, CURSOR_FORMAT};
use crate::error::MuxError;

const SESSION_FORMAT: &str =
    "#{session_id}\t#{session_name}\t#{session_windows}\t#{session_attached}";
const WINDOW_FORMAT: &str =
    "#{window_id}\t#{window_name}\t#{session_id}\t#{window_index}\t#{window_active}";
const PANE_FORMAT: &str = "#{pane_id}\t#{window_id}\t#{pane_index}";

/// tmux client, optionally bound to a named server socket (`tmux -L`).
#[derive(Debug, Clone, Default)]
pub struct TmuxBackend {
    socket: Option<String>,
}

impl TmuxBackend {
    pub fn new(socket: Option<String>) -> Self {
        Self {
            socket: socket.filter(|name| !name.trim().is_empty()),
        }
    }

    async fn tmux(&self, args: &[&str]) -> Result<ProcessOutput, MuxError> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(socket) = &self.socket {
            argv.push("-L".to_string());
            argv.push(socket.clone());
        }
        argv.extend(args.iter().map(|arg| arg.to_string()));
        debug!(args = ?argv, "tmux");
        run_process("tmux", &argv, None).await
    }

    /// Run a listing command, treating an absent server as "nothing listed".
    async fn tmux_listing(&self, args: &[&str], context: &str) -> Result<String, MuxError> {
        let output = self.tmux(args).await?;
        if output.exit_code != 0 && is_no_server(&output.stderr) {
            return Ok(String::new());
        }
        if output.exit_code != 0 && is_missing_target(&output.stderr) {
            return Err(MuxError::NotFound(format!("{context}: {}", output.details())));
        }
        Ok(ensure_success(output, context)?.stdout)
    }
}

#[async_trait]
impl Multiplexer for TmuxBackend {
    async fn list_sessions(&self) -> Result<Vec<Session>, MuxError> {
        let out = self
            .tmux_listing(&["list-sessions", "-F", SESSION_FORMAT], "list sessions")
            .await?;
        Ok(parse_sessions(&out))
    }

    async fn create_session(&self, name: &str) -> Result<Session, MuxError> {
        let output = self
            .tmux(&["new-session", "-d", "-s", name, "-P", "-F", SESSION_FORMAT])
            .await?;
        if output.exit_code != 0 {
            return Err(MuxError::CreationFailed(format!(
                "session `{name}`: {}",
                output.details()
            )));
        }
        parse_sessions(&output.stdout)
            .into_iter()
            .next()
            .ok_or_else(|| MuxError::Backend(format!("unparseable new-session output for `{name}`")))
    }

    async fn list_windows(&self, session_id: &str) -> Result<Vec<Window>, MuxError> {
        let out = self
            .tmux_listing(
                &["list-windows", "-t", session_id, "-F", WINDOW_FORMAT],
                "list windows",
            )
            .await?;
        Ok(parse_windows(&out))
    }

    async fn create_window(&self, session_id: &str, name: &str) -> Result<Window, MuxError> {
        let target = format!("{session_id}:");
        let output = self
            .tmux(&[
                "new-window", "-d", "-t", target.as_str(), "-n", name, "-P", "-F", WINDOW_FORMAT,
            ])
            .await?;
        if output.exit_code != 0 {
            return Err(MuxError::CreationFailed(format!(
                "window `{name}`: {}",
                output.details()
            )));
        }
        parse_windows(&output.stdout)
            .into_iter()
            .next()
            .ok_or_else(|| MuxError::Backend(format!("unparseable new-window output for `{name}`")))
    }

    async fn kill_window(&self, window_id: &str) -> Result<(), MuxError> {
        let output = self.tmux(&["kill-window", "-t", window_id]).await?;
        ensure_success(output, "kill window").map(|_| ())
    }

    async fn list_panes(&self, window_id: &str) -> Result<Vec<Pane>, MuxError> {
        let out = self
            .tmux_listing(&["list-panes", "-t", window_id, "-F", PANE_FORMAT], "list panes")
            .await?;
        Ok(parse_panes(&out))
    }

    async fn list_all_panes(&self) -> Result<Vec<Pane>, MuxError> {
        let out = self
            .tmux_listing(&["list-panes", "-a", "-F", PANE_FORMAT], "list panes")
            .await?;
        Ok(parse_panes(&out))
    }

    async fn current_session(&self) -> Result<Option<String>, MuxError> {
        if std::env::var_os("TMUX").is_none() {
            return Ok(None);
        }
        let pane = std::env::var("TMUX_PANE").unwrap_or_default();
        let mut args = vec!["display-message", "-p"];
        if !pane.is_empty() {
            args.push("-t");
            args.push(pane.as_str());
        }
        args.push("#{session_name}");
        let output = self.tmux(&args).await?;
        if output.exit_code != 0 {
            return Ok(None);
        }
        let name = output.stdout.trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    async fn pane_cursor(&self, pane_id: &str) -> Result<PaneCursor, MuxError> {
        let output = self
            .tmux(&["display-message", "-p", "-t", pane_id, CURSOR_FORMAT])
            .await?;
        if output.exit_code != 0 {
            return Err(MuxError::NotFound(format!("pane {pane_id}: {}", output.details())));
        }
        PaneCursor::parse(&output.stdout)
            .ok_or_else(|| MuxError::Backend(format!("unparseable cursor for pane {pane_id}")))
    }

    async fn send_line(&self, pane_id: &str, text: &str) -> Result<(), MuxError> {
        let typed = self.tmux(&["send-keys", "-l", "-t", pane_id, text]).await?;
        ensure_success(typed, "failed to send keys to tmux pane")?;
        let enter = self.tmux(&["send-keys", "-t", pane_id, "Enter"]).await?;
        ensure_success(enter, "failed to send Enter to tmux pane")?;
        Ok(())
    }

    async fn capture(&self, pane_id: &str, start: i64, end: i64) -> Result<String, MuxError> {
        let start = start.to_string();
        let end = end.to_string();
        let output = self
            .tmux(&[
                "capture-pane",
                "-p",
                "-J",
                "-t",
                pane_id,
                "-S",
                start.as_str(),
                "-E",
                end.as_str(),
            ])
            .await?;
        ensure_success(output, "failed to capture tmux pane").map(|out| out.stdout)
    }

    async fn wait_for(&self, channel: &str) -> Result<(), MuxError> {
        let output = self.tmux(&["wait-for", channel]).await?;
        ensure_success(output, "wait-for").map(|_| ())
    }

    async fn take_buffer(&self, name: &str) -> Result<Option<String>, MuxError> {
        let output = self.tmux(&["show-buffer", "-b", name]).await?;
        if output.exit_code != 0 {
            return Ok(None);
        }
        let deleted = self.tmux(&["delete-buffer", "-b", name]).await?;
        if deleted.exit_code != 0 {
            debug!(buffer = name, details = %deleted.details(), "delete-buffer failed");
        }
        Ok(Some(output.stdout))
    }

    async fn display_message(&self, pane_id: &str, text: &str) -> Result<(), MuxError> {
        let session = self
            .tmux(&["display-message", "-p", "-t", pane_id, "#{session_id}"])
            .await?;
        let session = ensure_success(session, "display-message")?.stdout;
        let session = session.trim();
        let listed = self
            .tmux(&["list-clients", "-t", session, "-F", "#{client_name}"])
            .await?;
        let listed = ensure_success(listed, "list clients")?.stdout;
        let clients = parse_clients(&listed);
        if clients.is_empty() {
            return Err(MuxError::NotFound(format!(
                "tmux client attached to the session of pane {pane_id}"
            )));
        }

        let mut shown = 0;
        for client in &clients {
            let output = self
                .tmux(&["display-message", "-c", client.as_str(), "-t", pane_id, text])
                .await?;
            if output.exit_code == 0 {
                shown += 1;
            } else {
                debug!(client = %client, details = %output.details(), "display-message failed");
            }
        }
        if shown == 0 {
            return Err(MuxError::Backend(format!(
                "display-message failed on every client of pane {pane_id}"
            )));
        }
        Ok(())
    }
}

fn is_no_server(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no server running") || lower.contains("error connecting to")
}

fn is_missing_target(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("can't find") || lower.contains("no such")
}

/// Parse `SESSION_FORMAT` rows, skipping malformed lines.
pub(crate) fn parse_sessions(output: &str) -> Vec<Session> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let id = cols.next()?.trim();
            let name = cols.next()?;
            let windows = cols.next()?.trim().parse::<usize>().ok()?;
            let attached = cols.next()?.trim().parse::<u32>().ok()? > 0;
            (!id.is_empty()).then(|| Session {
                id: id.to_string(),
                name: name.to_string(),
                windows,
                attached,
            })
        })
        .collect()
}

/// Parse `WINDOW_FORMAT` rows, skipping malformed lines.
pub(crate) fn parse_windows(output: &str) -> Vec<Window> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let id = cols.next()?.trim();
            let name = cols.next()?;
            let session_id = cols.next()?.trim();
            let index = cols.next()?.trim().parse::<u32>().ok()?;
            let active = cols.next()?.trim() == "1";
            (!id.is_empty()).then(|| Window {
                id: id.to_string(),
                name: name.to_string(),
                session_id: session_id.to_string(),
                index,
                active,
            })
        })
        .collect()
}

/// Parse `PANE_FORMAT` rows, skipping malformed lines.
pub(crate) fn parse_panes(output: &str) -> Vec<Pane> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let id = cols.next()?.trim();
            let window_id = cols.next()?.trim();
            let index = cols.next()?.trim().parse::<u32>().ok()?;
            (!id.is_empty()).then(|| Pane {
                id: id.to_string(),
                window_id: window_id.to_string(),
                index,
            })
        })
        .collect()
}

/// One client name per `list-clients -F '#{client_name}'` row.
pub(crate) fn parse_clients(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
