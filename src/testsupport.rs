//! Shared test fixtures: temp directories and an in-memory multiplexer.
//!
//! `FakeMux` models just enough of a tmux server for directory, resolver,
//! engine and router tests. Panes keep a line transcript whose last line is
//! the cursor row, and a configurable responder plays the part of the shell
//! by running the injected trailer: it stores the status payload, signals the
//! wait channel and removes the lease when the lease still holds its token.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

use crate::error::MuxError;
use crate::tmux::{Multiplexer, Pane, PaneCursor, Session, Window};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!(
            "muxcrew-{prefix}-{}-{millis}-{suffix}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const PROMPT: &str = "$ ";

#[derive(Debug, Default)]
struct FakeState {
    next_id: u32,
    sessions: Vec<(String, String, bool)>,
    windows: Vec<Window>,
    panes: Vec<Pane>,
    transcripts: HashMap<String, Vec<String>>,
    current_session: Option<String>,
    responder: Option<(i32, String)>,
    pending: Vec<String>,
    sent: Vec<(String, String)>,
    displayed: Vec<(String, String)>,
    buffers: HashMap<String, String>,
    signalled: HashSet<String>,
    session_races: HashSet<String>,
    window_races: HashSet<String>,
    fail_displays: bool,
    wait_calls: usize,
    capture_calls: usize,
}

impl FakeState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn add_session(&mut self, name: &str) -> String {
        let id = format!("${}", self.next());
        self.sessions.push((id.clone(), name.to_string(), false));
        id
    }

    fn add_window(&mut self, session_id: &str, name: &str) -> Window {
        let index = self
            .windows
            .iter()
            .filter(|w| w.session_id == session_id)
            .map(|w| w.index + 1)
            .max()
            .unwrap_or(0);
        let is_first = index == 0;
        let window = Window {
            id: format!("@{}", self.next()),
            name: name.to_string(),
            session_id: session_id.to_string(),
            index,
            active: is_first,
        };
        self.windows.push(window.clone());
        window
    }

    fn add_pane(&mut self, window_id: &str) -> String {
        let index = self
            .panes
            .iter()
            .filter(|p| p.window_id == window_id)
            .count() as u32;
        let id = format!("%{}", self.next());
        self.panes.push(Pane {
            id: id.clone(),
            window_id: window_id.to_string(),
            index,
        });
        self.transcripts.insert(id.clone(), vec![PROMPT.to_string()]);
        id
    }

    fn session(&self, id: &str) -> Option<&(String, String, bool)> {
        self.sessions.iter().find(|(sid, _, _)| sid == id)
    }

    fn to_session(&self, entry: &(String, String, bool)) -> Session {
        Session {
            id: entry.0.clone(),
            name: entry.1.clone(),
            windows: self.windows.iter().filter(|w| w.session_id == entry.0).count(),
            attached: entry.2,
        }
    }

    /// Run the trailer of a composite instruction as the shell would.
    ///
    /// Output without a trailing newline leaves the cursor on its last row,
    /// where the next prompt is then printed.
    fn complete(&mut self, pane_id: &str, line: &str, exit_code: i32, output: &str) -> bool {
        let Some(channel) = quoted_after(line, "wait-for -S '") else {
            return false;
        };
        let mut done = PaneCursor {
            history_size: 0,
            cursor_y: 0,
            cursor_x: 0,
        };
        if let Some(transcript) = self.transcripts.get_mut(pane_id) {
            transcript.push(String::new());
            for (i, part) in output.split('\n').enumerate() {
                if i > 0 {
                    transcript.push(String::new());
                }
                if let Some(last) = transcript.last_mut() {
                    last.push_str(part);
                }
            }
            done.cursor_y = transcript.len().saturating_sub(1) as u64;
            if let Some(last) = transcript.last_mut() {
                done.cursor_x = last.chars().count() as u64;
                last.push_str(PROMPT);
            }
        }
        if let Some(buffer) = quoted_after(line, "set-buffer -b '") {
            let payload = if line.contains("display-message -p") {
                format!(
                    "{exit_code} {} {} {}",
                    done.history_size, done.cursor_y, done.cursor_x
                )
            } else {
                exit_code.to_string()
            };
            self.buffers.insert(buffer, payload);
        }
        self.signalled.insert(channel);
        if let (Some(token), Some(lease)) =
            (quoted_after(line, "grep -qF '"), quoted_after(line, "rm -f '"))
        {
            if fs::read_to_string(&lease).is_ok_and(|raw| raw.contains(&token)) {
                let _ = fs::remove_file(&lease);
            }
        }
        true
    }
}

fn quoted_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let len = text[start..].find('\'')?;
    Some(text[start..start + len].to_string())
}

/// In-memory `Multiplexer` used by unit tests.
#[derive(Debug, Default)]
pub struct FakeMux {
    state: Mutex<FakeState>,
    signal: Notify,
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server with one session holding one window with one pane.
    pub fn with_pane(session: &str, window: &str) -> Self {
        let mux = Self::new();
        let session_id = mux.add_session(session);
        let window_id = mux.add_window(&session_id, window);
        mux.add_pane(&window_id);
        mux
    }

    pub fn add_session(&self, name: &str) -> String {
        self.lock().add_session(name)
    }

    pub fn add_window(&self, session_id: &str, name: &str) -> String {
        self.lock().add_window(session_id, name).id
    }

    pub fn add_pane(&self, window_id: &str) -> String {
        self.lock().add_pane(window_id)
    }

    pub fn remove_pane(&self, pane_id: &str) {
        let mut state = self.lock();
        state.panes.retain(|p| p.id != pane_id);
        state.transcripts.remove(pane_id);
    }

    /// Attach a client to the named session.
    pub fn attach(&self, name: &str) {
        for entry in self.lock().sessions.iter_mut().filter(|(_, n, _)| n == name) {
            entry.2 = true;
        }
    }

    pub fn set_current_session(&self, name: &str) {
        self.lock().current_session = Some(name.to_string());
    }

    /// Id of the first pane; panics when the server has none.
    pub fn only_pane_id(&self) -> String {
        self.lock().panes.first().expect("fake has no panes").id.clone()
    }

    /// Complete every subsequent injected instruction with this status/output.
    pub fn respond_with(&self, exit_code: i32, output: &str) {
        self.lock().responder = Some((exit_code, output.to_string()));
    }

    /// Let instructions that were never answered finish with status 0.
    pub fn finish_pending(&self) {
        let pending = std::mem::take(&mut self.lock().pending);
        self.finish(pending);
    }

    /// Finish only the oldest unanswered instruction.
    pub fn finish_oldest(&self) {
        let mut state = self.lock();
        if state.pending.is_empty() {
            return;
        }
        let oldest = state.pending.remove(0);
        drop(state);
        self.finish(vec![oldest]);
    }

    fn finish(&self, entries: Vec<String>) {
        let mut state = self.lock();
        for (pane_id, line) in entries.iter().filter_map(|entry| entry.split_once('\n')) {
            state.complete(pane_id, line, 0, "");
        }
        drop(state);
        self.signal.notify_waiters();
    }

    /// Make the next `create_session(name)` lose a race to another creator.
    pub fn race_session_create(&self, name: &str) {
        self.lock().session_races.insert(name.to_string());
    }

    /// Make the next `create_window(_, name)` race with a same-named window.
    pub fn race_window_create(&self, name: &str) {
        self.lock().window_races.insert(name.to_string());
    }

    pub fn fail_displays(&self) {
        self.lock().fail_displays = true;
    }

    pub fn wait_calls(&self) -> usize {
        self.lock().wait_calls
    }

    pub fn capture_calls(&self) -> usize {
        self.lock().capture_calls
    }

    /// Paste buffers and signalled-but-unwaited channels still on the server.
    pub fn leftovers(&self) -> (usize, usize) {
        let state = self.lock();
        (state.buffers.len(), state.signalled.len())
    }

    /// `(pane_id, text)` for every `send_line` call.
    pub fn sent_lines(&self) -> Vec<(String, String)> {
        self.lock().sent.clone()
    }

    /// `(pane_id, text)` for every `display_message` call.
    pub fn displayed(&self) -> Vec<(String, String)> {
        self.lock().displayed.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake mux state poisoned")
    }
}

#[async_trait]
impl Multiplexer for FakeMux {
    async fn list_sessions(&self) -> Result<Vec<Session>, MuxError> {
        let state = self.lock();
        Ok(state
            .sessions
            .iter()
            .map(|entry| state.to_session(entry))
            .collect())
    }

    async fn create_session(&self, name: &str) -> Result<Session, MuxError> {
        let mut state = self.lock();
        if state.session_races.remove(name) {
            let id = state.add_session(name);
            let window = state.add_window(&id, "main");
            state.add_pane(&window.id);
            return Err(MuxError::CreationFailed(format!(
                "session `{name}`: duplicate session: {name}"
            )));
        }
        if state.sessions.iter().any(|(_, n, _)| n == name) {
            return Err(MuxError::CreationFailed(format!(
                "session `{name}`: duplicate session: {name}"
            )));
        }
        let id = state.add_session(name);
        let window = state.add_window(&id, "main");
        state.add_pane(&window.id);
        let entry = state.session(&id).cloned().expect("just added");
        Ok(state.to_session(&entry))
    }

    async fn list_windows(&self, session_id: &str) -> Result<Vec<Window>, MuxError> {
        let state = self.lock();
        if state.session(session_id).is_none() {
            return Err(MuxError::NotFound(format!("session {session_id}")));
        }
        let mut windows: Vec<Window> = state
            .windows
            .iter()
            .filter(|w| w.session_id == session_id)
            .cloned()
            .collect();
        windows.sort_by_key(|w| w.index);
        Ok(windows)
    }

    async fn create_window(&self, session_id: &str, name: &str) -> Result<Window, MuxError> {
        let mut state = self.lock();
        if state.session(session_id).is_none() {
            return Err(MuxError::CreationFailed(format!(
                "window `{name}`: can't find session {session_id}"
            )));
        }
        if state.window_races.remove(name) {
            let racer = state.add_window(session_id, name);
            state.add_pane(&racer.id);
        }
        let window = state.add_window(session_id, name);
        state.add_pane(&window.id);
        Ok(window)
    }

    async fn kill_window(&self, window_id: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        state.windows.retain(|w| w.id != window_id);
        state.panes.retain(|p| p.window_id != window_id);
        Ok(())
    }

    async fn list_panes(&self, window_id: &str) -> Result<Vec<Pane>, MuxError> {
        let state = self.lock();
        let mut panes: Vec<Pane> = state
            .panes
            .iter()
            .filter(|p| p.window_id == window_id)
            .cloned()
            .collect();
        panes.sort_by_key(|p| p.index);
        Ok(panes)
    }

    async fn list_all_panes(&self) -> Result<Vec<Pane>, MuxError> {
        Ok(self.lock().panes.clone())
    }

    async fn current_session(&self) -> Result<Option<String>, MuxError> {
        Ok(self.lock().current_session.clone())
    }

    async fn pane_cursor(&self, pane_id: &str) -> Result<PaneCursor, MuxError> {
        let state = self.lock();
        let transcript = state
            .transcripts
            .get(pane_id)
            .ok_or_else(|| MuxError::NotFound(format!("pane {pane_id}")))?;
        Ok(PaneCursor {
            history_size: 0,
            cursor_y: transcript.len().saturating_sub(1) as u64,
            cursor_x: transcript.last().map_or(0, |line| line.chars().count()) as u64,
        })
    }

    async fn send_line(&self, pane_id: &str, text: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        let Some(transcript) = state.transcripts.get_mut(pane_id) else {
            return Err(MuxError::Backend(format!("can't find pane: {pane_id}")));
        };
        if let Some(last) = transcript.last_mut() {
            last.push_str(text);
        }
        state.sent.push((pane_id.to_string(), text.to_string()));
        let completed = match state.responder.clone() {
            Some((code, output)) => state.complete(pane_id, text, code, &output),
            None => false,
        };
        if !completed && text.contains("wait-for -S") {
            state.pending.push(format!("{pane_id}\n{text}"));
        }
        drop(state);
        self.signal.notify_waiters();
        Ok(())
    }

    async fn capture(&self, pane_id: &str, start: i64, end: i64) -> Result<String, MuxError> {
        let mut state = self.lock();
        state.capture_calls += 1;
        let transcript = state
            .transcripts
            .get(pane_id)
            .ok_or_else(|| MuxError::Backend(format!("can't find pane: {pane_id}")))?;
        let start = start.max(0) as usize;
        let end = (end.max(-1) + 1) as usize;
        let end = end.min(transcript.len());
        if start >= end {
            return Ok(String::new());
        }
        Ok(transcript[start..end]
            .iter()
            .map(|line| format!("{line}\n"))
            .collect())
    }

    async fn wait_for(&self, channel: &str) -> Result<(), MuxError> {
        self.lock().wait_calls += 1;
        loop {
            let notified = self.signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock().signalled.remove(channel) {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn take_buffer(&self, name: &str) -> Result<Option<String>, MuxError> {
        Ok(self.lock().buffers.remove(name))
    }

    async fn display_message(&self, pane_id: &str, text: &str) -> Result<(), MuxError> {
        let mut state = self.lock();
        let attached = state
            .panes
            .iter()
            .find(|p| p.id == pane_id)
            .and_then(|pane| state.windows.iter().find(|w| w.id == pane.window_id))
            .and_then(|window| state.session(&window.session_id))
            .is_some_and(|(_, _, attached)| *attached);
        if !attached {
            return Err(MuxError::NotFound(format!(
                "tmux client attached to the session of pane {pane_id}"
            )));
        }
        if state.fail_displays {
            return Err(MuxError::Backend(
                "display-message failed on every client".into(),
            ));
        }
        state.displayed.push((pane_id.to_string(), text.to_string()));
        Ok(())
    }
}
