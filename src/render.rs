//! Terminal output: styled status lines on stderr and plain-text formatters
//! for stdout listings.

use crossterm::style::{Color, Stylize};
use std::time::{Duration, UNIX_EPOCH};

use crate::mailbox::Message;
use crate::registry::WorkerRecord;
use crate::resolve::WorkerResolution;
use crate::tmux::Session;

const LABEL_ERROR: &str = "error:";
const GLYPH_BULLET: &str = "•";

/// Status/diagnostic writer. Command results go to stdout elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_ERROR.with(Color::Red).bold());
        } else {
            eprintln!("{LABEL_ERROR} {msg}");
        }
    }

    /// Informational lifecycle line, e.g. "created session crew".
    pub fn activity(&self, text: &str) {
        if self.color {
            eprintln!("{} {}", GLYPH_BULLET.with(Color::DarkGrey), text.bold());
        } else {
            eprintln!("{text}");
        }
    }
}

/// `ls` table with a `SESSION ID, NAME, WINDOWS, ATTACHED` header.
pub fn format_session_table(sessions: &[Session]) -> String {
    let rows: Vec<[String; 4]> = sessions
        .iter()
        .map(|s| {
            [
                s.id.clone(),
                s.name.clone(),
                s.windows.to_string(),
                if s.attached { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    format_table(["SESSION ID", "NAME", "WINDOWS", "ATTACHED"], &rows)
}

/// `worker ls` table.
pub fn format_worker_table(workers: &[WorkerRecord]) -> String {
    let rows: Vec<[String; 3]> = workers
        .iter()
        .map(|w| {
            [
                w.id.clone(),
                w.pane_id.clone(),
                w.session.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    format_table(["WORKER", "PANE", "SESSION"], &rows)
}

fn format_table<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut out = String::new();
    let header = header.map(str::to_string);
    for row in std::iter::once(&header).chain(rows) {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Inbox listing: one status line per message, then its body.
pub fn format_inbox(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&format!(
            "[{}] [{}] {} from={}\n",
            if message.read { "read" } else { "UNREAD" },
            if message.delivered_at.is_some() {
                "delivered"
            } else {
                "pending"
            },
            format_timestamp(message.created_at),
            message.from,
        ));
        for line in message.body.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Human report for `resolve`: optional fields appear only when present.
pub fn format_resolution(resolution: &WorkerResolution) -> String {
    let mut out = format!(
        "target: {}\nresolvedVia: {}\npaneId: {}\n",
        resolution.descriptor,
        resolution.resolved_via.as_str(),
        resolution.pane_id
    );
    if let Some(session) = &resolution.session {
        out.push_str(&format!("session: {session}\n"));
    }
    if let Some(worker) = &resolution.worker_id {
        out.push_str(&format!("workerId: {worker}\n"));
    }
    if let Some(index) = resolution.pane_index {
        out.push_str(&format!("paneIndex: {index}\n"));
    }
    out
}

/// Unix milliseconds as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_timestamp(millis: u64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_millis(millis))
}
