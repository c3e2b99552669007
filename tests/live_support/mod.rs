//! Harness for tests that drive a real tmux server.
//!
//! Each harness owns a private server on its own `-L` socket with `/bin/sh`
//! as the default shell, plus a scratch state root. Both are torn down on drop.

use muxcrew::tmux::TmuxBackend;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub struct LiveTmux {
    socket: String,
    state: PathBuf,
}

impl LiveTmux {
    /// Boot a private server, or panic with a readable reason.
    pub fn start(label: &str) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let socket = format!("muxcrew-test-{}-{label}-{id}", std::process::id());
        let state = std::env::temp_dir().join(&socket);
        fs::create_dir_all(&state).expect("state dir");

        let harness = Self { socket, state };
        harness.tmux(&["-f", "/dev/null", "new-session", "-d", "-s", "boot"]);
        harness.tmux(&["set-option", "-g", "default-shell", "/bin/sh"]);
        harness
    }

    pub fn backend(&self) -> TmuxBackend {
        TmuxBackend::new(Some(self.socket.clone()))
    }

    pub fn state(&self) -> &Path {
        &self.state
    }

    fn tmux(&self, args: &[&str]) {
        let status = Command::new("tmux")
            .arg("-L")
            .arg(&self.socket)
            .args(args)
            .status()
            .expect("tmux must be installed for live tests");
        assert!(status.success(), "tmux {args:?} failed with {status}");
    }
}

impl Drop for LiveTmux {
    fn drop(&mut self) {
        let _ = Command::new("tmux")
            .arg("-L")
            .arg(&self.socket)
            .arg("kill-server")
            .status();
        let _ = fs::remove_dir_all(&self.state);
    }
}
