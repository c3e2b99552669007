//! Correlation tokens and per-pane leases.
//!
//! A lease is a file created with `create_new`, which makes acquisition an
//! atomic test-and-set shared by every independent invocation. The lease
//! holds the token of the single outstanding request for its pane.
//!
//! A lease kept past its request (timeout or cancellation) also appends its
//! token to the pane's orphan list. The next holder of the lease drains that
//! list and cleans up what the late trailer left on the server.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::MuxError;
use crate::persist::now_unix_millis;
use crate::tmux::Multiplexer;

const LEASES_DIR: &str = "leases";
const ORPHANS_EXT: &str = "orphans";
const CHANNEL_PREFIX: &str = "muxcrew-";

/// Unique identifier binding one injected command to its completion signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Fresh token: 64 random bits from the OS RNG plus this process id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self(format!(
            "{:016x}-{}",
            u64::from_be_bytes(bytes),
            std::process::id()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the single-shot wait channel signalled on completion.
    pub fn channel(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.0)
    }

    /// Name of the paste buffer carrying the exit status payload.
    pub fn status_buffer(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.0)
    }
}

/// On-disk lease payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaseRecord {
    token: String,
    pane_id: String,
    pid: u32,
    acquired_at: u64,
}

/// Directory of pane leases under the state root.
#[derive(Debug, Clone)]
pub struct LeaseDir {
    dir: PathBuf,
}

impl LeaseDir {
    pub fn open(root: &Path) -> Result<Self, MuxError> {
        let dir = root.join(LEASES_DIR);
        fs::create_dir_all(&dir).map_err(|e| {
            MuxError::StoreFault(format!("failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// Lease file path for a pane id such as `%12`.
    pub fn path_for(&self, pane_id: &str) -> PathBuf {
        let safe: String = pane_id
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        self.dir.join(format!("pane{safe}.lease"))
    }

    /// Claim `pane_id` for `token`, or fail with `Busy`.
    ///
    /// A lease left behind for a pane that no longer exists is reclaimed once.
    pub async fn acquire(
        &self,
        mux: &dyn Multiplexer,
        pane_id: &str,
        token: &CorrelationToken,
    ) -> Result<PaneLease, MuxError> {
        let path = self.path_for(pane_id);
        let record = LeaseRecord {
            token: token.as_str().to_string(),
            pane_id: pane_id.to_string(),
            pid: std::process::id(),
            acquired_at: now_unix_millis(),
        };
        let payload = serde_json::to_vec(&record)
            .map_err(|e| MuxError::StoreFault(format!("failed to encode lease: {e}")))?;

        for attempt in 0..2 {
            match create_exclusive(&path, &payload) {
                Ok(()) => {
                    debug!(pane_id, token = token.as_str(), "lease acquired");
                    return Ok(PaneLease {
                        path,
                        token: token.clone(),
                        armed: true,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let live = mux
                        .list_all_panes()
                        .await?
                        .iter()
                        .any(|pane| pane.id == pane_id);
                    if live || attempt > 0 {
                        return Err(MuxError::Busy(pane_id.to_string()));
                    }
                    warn!(pane_id, "reclaiming lease for a pane that no longer exists");
                    let _ = fs::remove_file(&path);
                }
                Err(e) => {
                    return Err(MuxError::StoreFault(format!(
                        "failed to create lease {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Err(MuxError::Busy(pane_id.to_string()))
    }
}

fn create_exclusive(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(payload)
}

/// Claim on a pane. Dropping it removes the lease file if it still carries
/// this lease's token. [`PaneLease::keep`] leaves it for the injected command
/// to remove when it finishes.
#[derive(Debug)]
pub struct PaneLease {
    path: PathBuf,
    token: CorrelationToken,
    armed: bool,
}

impl PaneLease {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the lease in place; the in-flight command owns its removal.
    pub fn keep(mut self) {
        self.armed = false;
        let orphans = self.orphans_path();
        let recorded = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&orphans)
            .and_then(|mut file| writeln!(file, "{}", self.token.as_str()));
        if let Err(e) = recorded {
            warn!(path = %orphans.display(), error = %e, "failed to record orphaned request");
        }
    }

    /// Tokens of earlier requests on this pane that finished unobserved.
    pub fn take_orphans(&self) -> Vec<CorrelationToken> {
        let path = self.orphans_path();
        let Ok(raw) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        let _ = fs::remove_file(&path);
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| CorrelationToken(line.to_string()))
            .collect()
    }

    fn orphans_path(&self) -> PathBuf {
        self.path.with_extension(ORPHANS_EXT)
    }

    fn release(&self) {
        let Ok(raw) = fs::read(&self.path) else {
            return;
        };
        let ours = serde_json::from_slice::<LeaseRecord>(&raw)
            .map(|record| record.token == self.token.as_str())
            .unwrap_or(false);
        if ours {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl Drop for PaneLease {
    fn drop(&mut self) {
        if self.armed {
            self.release();
        }
    }
}
