//! Injects the commit and build time shown by `muxcrew --version`.
//!
//! Either value can be pinned from the environment for reproducible builds;
//! otherwise it is read from git/date, falling back to "unknown" markers.

use std::env;
use std::fs;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const HASH_VAR: &str = "MUXCREW_BUILD_GIT_HASH";
const TIMESTAMP_VAR: &str = "MUXCREW_BUILD_TIMESTAMP";

fn main() {
    watch_git_head();
    for var in [HASH_VAR, TIMESTAMP_VAR, "SOURCE_DATE_EPOCH"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let hash = pinned(HASH_VAR).unwrap_or_else(commit_hash);
    let timestamp = pinned(TIMESTAMP_VAR).unwrap_or_else(build_timestamp);
    println!("cargo:rustc-env={HASH_VAR}={hash}");
    println!("cargo:rustc-env={TIMESTAMP_VAR}={timestamp}");
}

fn pinned(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

/// Rebuild when HEAD moves, including commits on the checked-out branch.
fn watch_git_head() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    if let Some(reference) = fs::read_to_string(".git/HEAD")
        .ok()
        .and_then(|head| head.trim().strip_prefix("ref: ").map(str::to_string))
    {
        println!("cargo:rerun-if-changed=.git/{reference}");
    }
}

fn commit_hash() -> String {
    capture("git", &["describe", "--always", "--dirty=-modified", "--abbrev=12"])
        .unwrap_or_else(|| "unknown".to_string())
}

fn build_timestamp() -> String {
    let epoch = pinned("SOURCE_DATE_EPOCH");
    let formatted = match &epoch {
        Some(secs) => capture("date", &["-u", "-d", &format!("@{secs}"), "+%Y-%m-%dT%H:%M:%SZ"]),
        None => capture("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"]),
    };
    formatted.unwrap_or_else(|| {
        let secs = epoch.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|delta| delta.as_secs())
                .unwrap_or(0)
                .to_string()
        });
        format!("unix:{secs}")
    })
}

fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
