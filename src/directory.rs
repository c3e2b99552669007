//! Find-or-create access to the session/window/pane hierarchy.
//!
//! Every mutating call re-checks the backend after creating, so independent
//! invocations racing on the same name converge on one resource without any
//! in-process lock.

use tracing::{debug, info, warn};

use crate::error::MuxError;
use crate::tmux::{Multiplexer, Pane, Session, Window};

/// Thin adapter over an explicit multiplexer handle.
#[derive(Clone, Copy)]
pub struct Directory<'a> {
    mux: &'a dyn Multiplexer,
}

impl<'a> Directory<'a> {
    pub fn new(mux: &'a dyn Multiplexer) -> Self {
        Self { mux }
    }

    pub fn mux(&self) -> &'a dyn Multiplexer {
        self.mux
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, MuxError> {
        self.mux.list_sessions().await
    }

    pub async fn find_session_by_name(&self, name: &str) -> Result<Option<Session>, MuxError> {
        Ok(self
            .mux
            .list_sessions()
            .await?
            .into_iter()
            .find(|session| session.name == name))
    }

    /// Idempotent create: returns the existing session when one has `name`.
    pub async fn create_session(&self, name: &str) -> Result<Session, MuxError> {
        Ok(self.ensure_session(name).await?.0)
    }

    /// Find-or-create a session. The flag is true only when this call created it.
    pub async fn ensure_session(&self, name: &str) -> Result<(Session, bool), MuxError> {
        validate_name("session", name)?;
        if let Some(existing) = self.find_session_by_name(name).await? {
            return Ok((existing, false));
        }
        match self.mux.create_session(name).await {
            Ok(session) => {
                info!(session = name, id = %session.id, "created session");
                Ok((session, true))
            }
            Err(MuxError::CreationFailed(reason)) => {
                // Another caller may have won the race between find and create.
                match self.find_session_by_name(name).await? {
                    Some(existing) => {
                        debug!(session = name, "session appeared concurrently");
                        Ok((existing, false))
                    }
                    None => Err(MuxError::CreationFailed(reason)),
                }
            }
            Err(other) => Err(other),
        }
    }

    pub async fn list_windows(&self, session_id: &str) -> Result<Vec<Window>, MuxError> {
        let mut windows = self.mux.list_windows(session_id).await?;
        windows.sort_by_key(|window| window.index);
        Ok(windows)
    }

    /// Window selected by name, or by numeric index when no name matches.
    /// Among same-named windows the lowest index wins.
    pub async fn find_window(
        &self,
        session_id: &str,
        selector: &str,
    ) -> Result<Option<Window>, MuxError> {
        let windows = self.list_windows(session_id).await?;
        if let Some(named) = windows.iter().find(|window| window.name == selector) {
            return Ok(Some(named.clone()));
        }
        let by_index = selector
            .parse::<u32>()
            .ok()
            .and_then(|index| windows.iter().find(|window| window.index == index));
        Ok(by_index.cloned())
    }

    /// Idempotent create: returns the canonical window named `name`.
    pub async fn create_window(&self, session_id: &str, name: &str) -> Result<Window, MuxError> {
        Ok(self.ensure_window(session_id, name).await?.0)
    }

    /// Find-or-create a window inside `session_id`.
    ///
    /// When a concurrent caller created a same-named window too, the one with
    /// the lowest index is kept and the surplus window created here is killed.
    pub async fn ensure_window(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<(Window, bool), MuxError> {
        validate_name("window", name)?;
        if let Some(existing) = self.find_window(session_id, name).await? {
            return Ok((existing, false));
        }
        let created = match self.mux.create_window(session_id, name).await {
            Ok(window) => window,
            Err(MuxError::CreationFailed(reason)) => {
                return match self.find_window(session_id, name).await? {
                    Some(existing) => Ok((existing, false)),
                    None => Err(MuxError::CreationFailed(reason)),
                };
            }
            Err(other) => return Err(other),
        };

        let canonical = self
            .list_windows(session_id)
            .await?
            .into_iter()
            .find(|window| window.name == name);
        match canonical {
            Some(window) if window.id != created.id => {
                warn!(
                    window = name,
                    kept = %window.id,
                    dropped = %created.id,
                    "collapsing duplicate window"
                );
                self.mux.kill_window(&created.id).await?;
                Ok((window, false))
            }
            _ => {
                info!(window = name, id = %created.id, "created window");
                Ok((created, true))
            }
        }
    }

    pub async fn list_panes(&self, window_id: &str) -> Result<Vec<Pane>, MuxError> {
        let mut panes = self.mux.list_panes(window_id).await?;
        panes.sort_by_key(|pane| pane.index);
        Ok(panes)
    }

    /// Lowest-index pane of a window.
    pub async fn first_pane(&self, window_id: &str) -> Result<Pane, MuxError> {
        self.list_panes(window_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MuxError::NotFound(format!("window {window_id} has no panes")))
    }

    /// Active window of a session, falling back to its lowest index.
    pub async fn active_window(&self, session_id: &str) -> Result<Window, MuxError> {
        let windows = self.list_windows(session_id).await?;
        windows
            .iter()
            .find(|window| window.active)
            .or_else(|| windows.first())
            .cloned()
            .ok_or_else(|| MuxError::NotFound(format!("session {session_id} has no windows")))
    }

    pub async fn pane_exists(&self, pane_id: &str) -> Result<bool, MuxError> {
        Ok(self
            .mux
            .list_all_panes()
            .await?
            .iter()
            .any(|pane| pane.id == pane_id))
    }
}

/// tmux reserves `:` and `.` as target separators.
fn validate_name(kind: &str, name: &str) -> Result<(), MuxError> {
    if name.trim().is_empty() {
        return Err(MuxError::InvalidArguments(format!("{kind} name cannot be empty")));
    }
    if name.contains([':', '.']) {
        return Err(MuxError::InvalidArguments(format!(
            "{kind} name `{name}` cannot contain `:` or `.`"
        )));
    }
    Ok(())
}
