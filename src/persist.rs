//! Crash-safe file publishing shared by the mailbox and worker registry.
//!
//! Every write lands in a uniquely named sibling temp file first and is
//! synced to disk before it is published, so a reader never observes a
//! partially written record, even after a crash. Two publish modes exist:
//! [`replace_atomic`] (last writer wins, via rename) and [`publish_new`]
//! (first writer wins, via hard link, which fails if the target exists).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Suffix shared by all in-flight temp files; listings skip these.
pub const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path`, replacing any previous content atomically.
pub fn replace_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = write_temp_sibling(path, bytes)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Publish `bytes` at `path` only if nothing exists there yet.
///
/// Returns `ErrorKind::AlreadyExists` when another writer got there first; the
/// existing file is left untouched.
pub fn publish_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = write_temp_sibling(path, bytes)?;
    let linked = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    linked
}

/// True when a directory entry is an in-flight temp file.
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

fn write_temp_sibling(path: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = parent.join(format!(
        ".{file_name}.{}.{}.{}{TEMP_SUFFIX}",
        std::process::id(),
        now_unix_nanos(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(tmp)
}

/// Current Unix timestamp in milliseconds.
pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current Unix timestamp in nanoseconds.
pub fn now_unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestTempDir;

    #[test]
    fn publish_new_refuses_to_overwrite() {
        let tmp = TestTempDir::new("persist-new");
        let path = tmp.child("record.json");
        publish_new(&path, b"first").expect("first publish");
        let err = publish_new(&path, b"second").expect_err("second publish must fail");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).expect("read"), "first");
    }

    #[test]
    fn losing_publish_leaves_only_the_winner() {
        let tmp = TestTempDir::new("persist-loser");
        let path = tmp.child("m.delivered");
        publish_new(&path, b"100").expect("winner");
        publish_new(&path, b"200").expect_err("loser");
        let names: Vec<_> = fs::read_dir(tmp.path())
            .expect("list")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["m.delivered"]);
        assert_eq!(fs::read_to_string(&path).expect("read"), "100");
    }

    #[test]
    fn replace_atomic_overwrites_and_leaves_no_temp_files() {
        let tmp = TestTempDir::new("persist-replace");
        let path = tmp.child("workers.json");
        replace_atomic(&path, b"one").expect("write one");
        replace_atomic(&path, b"two").expect("write two");
        assert_eq!(fs::read_to_string(&path).expect("read"), "two");
        let leftovers = fs::read_dir(tmp.path())
            .expect("list")
            .filter_map(Result::ok)
            .filter(|entry| is_temp_file(&entry.file_name().to_string_lossy()))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn temp_file_detection_matches_sibling_names() {
        assert!(is_temp_file(".a.json.12.34.0.tmp"));
        assert!(!is_temp_file("a.json"));
        assert!(!is_temp_file("notes.tmp"));
    }
}
