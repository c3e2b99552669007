//! Target descriptor resolution.
//!
//! Strategies are tried in a fixed order and the first whose syntax matches
//! owns the outcome; a later strategy is never consulted after an earlier one
//! matched, even when the earlier one fails.
//!
//! 1. `session:window` direct address
//! 2. registered worker id
//! 3. integer pane index in the current (or default) session
//! 4. bare session name, when such a session exists
//!
//! Resolution is read-only. Nothing is created here.

use serde::Serialize;
use tracing::debug;

use crate::directory::Directory;
use crate::error::MuxError;
use crate::registry::WorkerRegistry;

/// Which strategy produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedVia {
    DirectAddress,
    WorkerRegistry,
    PaneIndex,
}

impl ResolvedVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectAddress => "directAddress",
            Self::WorkerRegistry => "workerRegistry",
            Self::PaneIndex => "paneIndex",
        }
    }
}

/// A descriptor bound to a concrete pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResolution {
    #[serde(skip)]
    pub descriptor: String,
    pub resolved_via: ResolvedVia,
    pub pane_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Re-verify that the resolved pane is still live before returning.
    pub check_liveness: bool,
}

impl ResolveOptions {
    pub fn live() -> Self {
        Self {
            check_liveness: true,
        }
    }
}

/// Syntactic shape of a descriptor, before any backend lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor<'a> {
    Address { session: &'a str, window: &'a str },
    Bare(&'a str),
}

/// Split a descriptor into its syntactic shape.
pub fn parse_descriptor(raw: &str) -> Result<Descriptor<'_>, MuxError> {
    let descriptor = raw.trim();
    if descriptor.is_empty() {
        return Err(MuxError::Unresolvable(raw.to_string()));
    }
    match descriptor.split_once(':') {
        Some((session, window)) => {
            let (session, window) = (session.trim(), window.trim());
            if session.is_empty() || window.is_empty() {
                return Err(MuxError::Unresolvable(descriptor.to_string()));
            }
            Ok(Descriptor::Address { session, window })
        }
        None => Ok(Descriptor::Bare(descriptor)),
    }
}

/// Non-negative integer pane index, if the word is one.
pub fn parse_pane_index(word: &str) -> Option<u32> {
    if word.is_empty() || !word.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    word.parse().ok()
}

pub struct Resolver<'a> {
    directory: Directory<'a>,
    registry: WorkerRegistry,
    default_session: String,
}

impl<'a> Resolver<'a> {
    pub fn new(directory: Directory<'a>, registry: WorkerRegistry, default_session: &str) -> Self {
        Self {
            directory,
            registry,
            default_session: default_session.to_string(),
        }
    }

    pub async fn resolve(
        &self,
        descriptor: &str,
        options: ResolveOptions,
    ) -> Result<WorkerResolution, MuxError> {
        let resolution = match parse_descriptor(descriptor)? {
            Descriptor::Address { session, window } => {
                self.by_address(session, Some(window)).await?
            }
            Descriptor::Bare(word) => self.by_word(word).await?,
        };
        debug!(
            descriptor,
            via = resolution.resolved_via.as_str(),
            pane_id = %resolution.pane_id,
            "target resolved"
        );
        if options.check_liveness && !self.directory.pane_exists(&resolution.pane_id).await? {
            return Err(MuxError::NotFound(format!(
                "pane {} for `{}` is no longer live",
                resolution.pane_id, resolution.descriptor
            )));
        }
        Ok(resolution)
    }

    /// Like [`Resolver::resolve`] with liveness, except that a
    /// `session:window` address or an unknown bare session name is created
    /// first. Returns the resolution plus a description of each resource
    /// created along the way.
    pub async fn ensure(
        &self,
        descriptor: &str,
    ) -> Result<(WorkerResolution, Vec<String>), MuxError> {
        let mut created = Vec::new();
        let (session_name, window) = match parse_descriptor(descriptor)? {
            Descriptor::Address { session, window } => (session, Some(window)),
            Descriptor::Bare(word)
                if self.registry.lookup(word)?.is_none() && parse_pane_index(word).is_none() =>
            {
                (word, None)
            }
            Descriptor::Bare(_) => {
                return Ok((self.resolve(descriptor, ResolveOptions::live()).await?, created))
            }
        };

        let (session, new_session) = self.directory.ensure_session(session_name).await?;
        if new_session {
            created.push(format!("session {}", session.name));
        }
        let window = match window {
            Some(name) => {
                let (window, new_window) = self.directory.ensure_window(&session.id, name).await?;
                if new_window {
                    created.push(format!("window {}:{}", session.name, window.name));
                }
                window
            }
            None => self.directory.active_window(&session.id).await?,
        };
        let pane = self.directory.first_pane(&window.id).await?;
        Ok((
            WorkerResolution {
                descriptor: descriptor.trim().to_string(),
                resolved_via: ResolvedVia::DirectAddress,
                pane_id: pane.id,
                session: Some(session.name),
                worker_id: None,
                pane_index: None,
            },
            created,
        ))
    }

    async fn by_word(&self, word: &str) -> Result<WorkerResolution, MuxError> {
        if let Some(worker) = self.registry.lookup(word)? {
            return Ok(WorkerResolution {
                descriptor: word.to_string(),
                resolved_via: ResolvedVia::WorkerRegistry,
                pane_id: worker.pane_id,
                session: worker.session,
                worker_id: Some(worker.id),
                pane_index: None,
            });
        }
        if let Some(index) = parse_pane_index(word) {
            return self.by_pane_index(word, index).await;
        }
        if self.directory.find_session_by_name(word).await?.is_some() {
            return self.by_address(word, None).await;
        }
        Err(MuxError::Unresolvable(word.to_string()))
    }

    /// `window == None` selects the session's active window.
    async fn by_address(
        &self,
        session_name: &str,
        window: Option<&str>,
    ) -> Result<WorkerResolution, MuxError> {
        let descriptor = match window {
            Some(window) => format!("{session_name}:{window}"),
            None => session_name.to_string(),
        };
        let session = self
            .directory
            .find_session_by_name(session_name)
            .await?
            .ok_or_else(|| MuxError::NotFound(format!("session `{session_name}`")))?;
        let window = match window {
            Some(selector) => self
                .directory
                .find_window(&session.id, selector)
                .await?
                .ok_or_else(|| MuxError::NotFound(format!("window `{descriptor}`")))?,
            None => self.directory.active_window(&session.id).await?,
        };
        let pane = self.directory.first_pane(&window.id).await?;
        Ok(WorkerResolution {
            descriptor,
            resolved_via: ResolvedVia::DirectAddress,
            pane_id: pane.id,
            session: Some(session.name),
            worker_id: None,
            pane_index: None,
        })
    }

    async fn by_pane_index(&self, word: &str, index: u32) -> Result<WorkerResolution, MuxError> {
        let session_name = match self.directory.mux().current_session().await? {
            Some(current) => current,
            None => self.default_session.clone(),
        };
        let session = self
            .directory
            .find_session_by_name(&session_name)
            .await?
            .ok_or_else(|| MuxError::NotFound(format!("session `{session_name}`")))?;
        let window = self.directory.active_window(&session.id).await?;
        let pane = self
            .directory
            .list_panes(&window.id)
            .await?
            .into_iter()
            .find(|pane| pane.index == index)
            .ok_or_else(|| {
                MuxError::NotFound(format!("pane index {index} in session `{session_name}`"))
            })?;
        Ok(WorkerResolution {
            descriptor: word.to_string(),
            resolved_via: ResolvedVia::PaneIndex,
            pane_id: pane.id,
            session: Some(session.name),
            worker_id: None,
            pane_index: Some(index),
        })
    }
}
