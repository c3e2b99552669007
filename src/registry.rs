//! Persistent mapping from symbolic worker ids to panes.
//!
//! One JSON file per worker under `<root>/workers/`. Writes go through
//! [`replace_atomic`], so re-registering a worker is last-writer-wins and a
//! reader never sees a half-written record.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MuxError;
use crate::persist::{is_temp_file, now_unix_millis, replace_atomic};

const WORKERS_DIR: &str = "workers";
const WORKER_FILE_EXT: &str = "json";

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub id: String,
    pub pane_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub registered_at: u64,
}

/// File-backed worker registry shared by every invocation.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    dir: PathBuf,
}

impl WorkerRegistry {
    /// Registry rooted at `<root>/workers`. The directory is created on first write.
    pub fn open(root: &Path) -> Self {
        Self {
            dir: root.join(WORKERS_DIR),
        }
    }

    pub fn register(
        &self,
        id: &str,
        pane_id: &str,
        session: Option<&str>,
    ) -> Result<WorkerRecord, MuxError> {
        validate_worker_id(id)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            MuxError::StoreFault(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        let record = WorkerRecord {
            id: id.to_string(),
            pane_id: pane_id.to_string(),
            session: session.map(str::to_string),
            registered_at: now_unix_millis(),
        };
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| MuxError::StoreFault(format!("failed to encode worker {id}: {e}")))?;
        let path = self.worker_path(id);
        replace_atomic(&path, &json).map_err(|e| {
            MuxError::StoreFault(format!("failed to write {}: {e}", path.display()))
        })?;
        debug!(worker = id, pane_id, "worker registered");
        Ok(record)
    }

    /// Remove a worker. Returns false when it was not registered.
    pub fn unregister(&self, id: &str) -> Result<bool, MuxError> {
        validate_worker_id(id)?;
        let path = self.worker_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MuxError::StoreFault(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }

    /// Look up a worker. Descriptors that cannot be worker ids yield `None`.
    pub fn lookup(&self, id: &str) -> Result<Option<WorkerRecord>, MuxError> {
        if validate_worker_id(id).is_err() {
            return Ok(None);
        }
        let path = self.worker_path(id);
        match fs::read(&path) {
            Ok(raw) => parse_record(&path, &raw).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MuxError::StoreFault(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// All workers, ordered by id.
    pub fn list(&self) -> Result<Vec<WorkerRecord>, MuxError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MuxError::StoreFault(format!(
                    "failed to list {}: {e}",
                    self.dir.display()
                )))
            }
        };
        let mut workers = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| MuxError::StoreFault(format!("failed to read worker entry: {e}")))?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if is_temp_file(&name)
                || path.extension().and_then(|ext| ext.to_str()) != Some(WORKER_FILE_EXT)
            {
                continue;
            }
            let raw = fs::read(&path).map_err(|e| {
                MuxError::StoreFault(format!("failed to read {}: {e}", path.display()))
            })?;
            workers.push(parse_record(&path, &raw)?);
        }
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workers)
    }

    fn worker_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{WORKER_FILE_EXT}"))
    }
}

fn parse_record(path: &Path, raw: &[u8]) -> Result<WorkerRecord, MuxError> {
    serde_json::from_slice(raw)
        .map_err(|e| MuxError::StoreFault(format!("corrupt worker record {}: {e}", path.display())))
}

/// Worker ids are ASCII letters, digits, `.`, `-` and `_`. A `:` is never
/// allowed, so a worker id cannot shadow a `session:window` address.
pub fn validate_worker_id(id: &str) -> Result<(), MuxError> {
    if id.is_empty() {
        return Err(MuxError::InvalidArguments("worker id cannot be empty".into()));
    }
    if id == "." || id == ".." {
        return Err(MuxError::InvalidArguments(
            "worker id cannot be '.' or '..'".into(),
        ));
    }
    if id
        .chars()
        .any(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
    {
        return Err(MuxError::InvalidArguments(format!(
            "worker id `{id}` can only contain ASCII letters, numbers, '.', '-', '_'"
        )));
    }
    Ok(())
}
