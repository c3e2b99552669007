//! Composite instruction and output-region helpers.
//!
//! The injected line runs the user's command and stores its status together
//! with the cursor position in a named paste buffer. It then signals the wait
//! channel and drops the pane lease if the lease still carries its token.
//! Nothing is printed into the pane, so the captured transcript holds only
//! what the command itself wrote.

use std::path::Path;

use super::token::CorrelationToken;
use crate::tmux::process::shell_quote;
use crate::tmux::{PaneCursor, CURSOR_FORMAT};

/// Build the single line typed into `pane_id` for one request.
pub fn composite_instruction(
    command: &str,
    pane_id: &str,
    token: &CorrelationToken,
    lease: &Path,
) -> String {
    let command_q = shell_quote(command);
    let pane_q = shell_quote(pane_id);
    let format_q = shell_quote(CURSOR_FORMAT);
    let buffer_q = shell_quote(&token.status_buffer());
    let channel_q = shell_quote(&token.channel());
    let token_q = shell_quote(token.as_str());
    let lease_q = shell_quote(&lease.display().to_string());
    format!(
        "eval {command_q}; __mc=$?; \
         tmux set-buffer -b {buffer_q} \"$__mc $(tmux display-message -p -t {pane_q} {format_q})\"; \
         tmux wait-for -S {channel_q}; \
         grep -qF {token_q} {lease_q} && rm -f {lease_q}"
    )
}

/// Decode the trailer payload: exit status, then the cursor as it stood when
/// the command returned. The cursor is `None` if the pane could not report it.
pub fn parse_payload(payload: &str) -> Option<(i32, Option<PaneCursor>)> {
    let payload = payload.trim();
    let (status, rest) = payload.split_once(' ').unwrap_or((payload, ""));
    let status = status.parse::<i32>().ok()?;
    Some((status, PaneCursor::parse(rest)))
}

/// Rows to capture for a completed command, relative to the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRegion {
    /// The line the instruction was typed on.
    pub start: i64,
    /// Last row that ended with a newline.
    pub end: i64,
    /// Row holding output without a trailing newline, and its width.
    pub tail: Option<(i64, usize)>,
}

/// Region between the prompt line in `before` and the cursor in `done`.
///
/// Both cursors are converted with `history_now`, the history size at capture
/// time, so lines scrolled away in the meantime are still addressed
/// correctly. Returns `None` when the screen was cleared under the command.
pub fn output_region(
    before: PaneCursor,
    done: PaneCursor,
    history_now: u64,
) -> Option<OutputRegion> {
    let start = before.absolute_line() as i64 - history_now as i64;
    let row = done.absolute_line() as i64 - history_now as i64;
    let end = row - 1;
    (end >= start).then_some(OutputRegion {
        start,
        end,
        tail: (done.cursor_x > 0).then_some((row, done.cursor_x as usize)),
    })
}

/// Append the first `columns` characters of the tail row to a capture.
///
/// A joined capture that does not end in a newline stopped on a wrapped line,
/// so the fragment continues that line instead of starting a new one.
pub fn splice_tail(body: &str, tail_row: &str, columns: usize) -> String {
    let fragment: String = tail_row
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(columns)
        .collect();
    let mut joined = String::with_capacity(body.len() + fragment.len());
    joined.push_str(body);
    joined.push_str(&fragment);
    joined
}

/// Strip the echoed instruction line and blank edges from a capture.
pub fn trim_capture(capture: &str) -> String {
    let mut lines: Vec<&str> = capture.lines().collect();
    if !lines.is_empty() {
        lines.remove(0);
    }
    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}
