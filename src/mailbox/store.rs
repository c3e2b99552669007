//! On-disk mailbox layout.
//!
//! ```text
//! <root>/mailbox/<worker>/<created-nanos>-<id>.json   immutable record
//! <root>/mailbox/<worker>/<id>.delivered              first delivery time
//! <root>/mailbox/<worker>/<id>.read                   read marker
//! ```
//!
//! Records and markers are only ever published with [`publish_new`], never
//! rewritten or removed. Concurrent senders cannot clobber each other,
//! `deliveredAt` cannot be cleared and `read` cannot revert.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{generate_message_id, Message};
use crate::error::MuxError;
use crate::persist::{is_temp_file, now_unix_millis, now_unix_nanos, publish_new};
use crate::registry::validate_worker_id;

const MAILBOX_DIR: &str = "mailbox";
const RECORD_EXT: &str = ".json";
const DELIVERED_EXT: &str = ".delivered";
const READ_EXT: &str = ".read";
const MAX_ID_ATTEMPTS: usize = 64;

#[derive(Debug, Clone)]
pub struct MailboxStore {
    root: PathBuf,
    dir: PathBuf,
}

impl MailboxStore {
    pub fn open(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dir: root.join(MAILBOX_DIR),
        }
    }

    /// State root the mailbox lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a new unread, undelivered message for `to`.
    pub fn append(&self, from: &str, to: &str, body: &str) -> Result<Message, MuxError> {
        validate_worker_id(to)?;
        if from.trim().is_empty() {
            return Err(MuxError::InvalidArguments("sender cannot be empty".into()));
        }
        let inbox = self.inbox_dir(to);
        fs::create_dir_all(&inbox).map_err(|e| fault("create", &inbox, e))?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let message = Message {
                id: generate_message_id(),
                from: from.to_string(),
                to: to.to_string(),
                body: body.to_string(),
                created_at: now_unix_millis(),
                delivered_at: None,
                read: false,
            };
            let path = inbox.join(format!(
                "{:020}-{}{RECORD_EXT}",
                now_unix_nanos(),
                message.id
            ));
            let json = serde_json::to_vec_pretty(&message).map_err(|e| {
                MuxError::StoreFault(format!("failed to encode message {}: {e}", message.id))
            })?;
            match publish_new(&path, &json) {
                Ok(()) => {
                    debug!(to, id = %message.id, "message stored");
                    return Ok(message);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(fault("publish", &path, e)),
            }
        }
        Err(MuxError::StoreFault(
            "failed to allocate a unique message id".into(),
        ))
    }

    /// Every message for `worker`, oldest first. Never mutates anything.
    pub fn inbox(&self, worker: &str) -> Result<Vec<Message>, MuxError> {
        validate_worker_id(worker)?;
        let mut messages = Vec::new();
        for path in self.record_paths(worker)? {
            let raw = fs::read(&path).map_err(|e| fault("read", &path, e))?;
            let mut message: Message = serde_json::from_slice(&raw).map_err(|e| {
                MuxError::StoreFault(format!("corrupt message record {}: {e}", path.display()))
            })?;
            message.delivered_at = self.delivered_at(worker, &message.id)?;
            message.read = self.marker(worker, &message.id, READ_EXT).exists();
            messages.push(message);
        }
        Ok(messages)
    }

    /// Record the first successful delivery. Returns the effective timestamp,
    /// which is the earlier one when the message was already delivered.
    pub fn mark_delivered(&self, worker: &str, id: &str, at: u64) -> Result<u64, MuxError> {
        self.require_message(worker, id)?;
        let path = self.marker(worker, id, DELIVERED_EXT);
        match publish_new(&path, at.to_string().as_bytes()) {
            Ok(()) => Ok(at),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => self
                .delivered_at(worker, id)?
                .ok_or_else(|| MuxError::StoreFault(format!("{} vanished", path.display()))),
            Err(e) => Err(fault("publish", &path, e)),
        }
    }

    /// Mark a message read. Returns false when it already was.
    pub fn mark_read(&self, worker: &str, id: &str) -> Result<bool, MuxError> {
        self.require_message(worker, id)?;
        let path = self.marker(worker, id, READ_EXT);
        match publish_new(&path, now_unix_millis().to_string().as_bytes()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(fault("publish", &path, e)),
        }
    }

    fn inbox_dir(&self, worker: &str) -> PathBuf {
        self.dir.join(worker)
    }

    fn marker(&self, worker: &str, id: &str, ext: &str) -> PathBuf {
        self.inbox_dir(worker).join(format!("{id}{ext}"))
    }

    /// Record files sorted by name, which is creation order.
    fn record_paths(&self, worker: &str) -> Result<Vec<PathBuf>, MuxError> {
        let dir = self.inbox_dir(worker);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(fault("list", &dir, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| fault("list", &dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_temp_file(&name) && name.ends_with(RECORD_EXT) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }

    fn require_message(&self, worker: &str, id: &str) -> Result<(), MuxError> {
        validate_worker_id(worker)?;
        let found = self.record_paths(worker)?.iter().any(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(record_id)
                .is_some_and(|stored| stored == id)
        });
        if found {
            Ok(())
        } else {
            Err(MuxError::NotFound(format!("message {id} for worker {worker}")))
        }
    }

    fn delivered_at(&self, worker: &str, id: &str) -> Result<Option<u64>, MuxError> {
        let path = self.marker(worker, id, DELIVERED_EXT);
        match fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse::<u64>().map(Some).map_err(|e| {
                MuxError::StoreFault(format!("corrupt delivery marker {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(fault("read", &path, e)),
        }
    }
}

/// Message id of a `<created-nanos>-<id>.json` record name.
fn record_id(name: &str) -> Option<&str> {
    let (_, id) = name.strip_suffix(RECORD_EXT)?.split_once('-')?;
    Some(id)
}

fn fault(action: &str, path: &Path, err: io::Error) -> MuxError {
    MuxError::StoreFault(format!("failed to {action} {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestTempDir;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn send_then_inbox_round_trip() {
        let tmp = TestTempDir::new("mailbox-round-trip");
        let store = MailboxStore::open(tmp.path());
        let sent = store.append("operator", "w1", "hello").expect("append");

        let inbox = store.inbox("w1").expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, sent.id);
        assert_eq!(inbox[0].from, "operator");
        assert_eq!(inbox[0].body, "hello");
        assert!(!inbox[0].read);
        assert_eq!(inbox[0].delivered_at, None);
    }

    #[test]
    fn concurrent_appends_produce_distinct_intact_records() {
        let tmp = TestTempDir::new("mailbox-concurrent");
        let store = Arc::new(MailboxStore::open(tmp.path()));
        const SENDERS: usize = 16;

        let handles: Vec<_> = (0..SENDERS)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .append(&format!("sender-{n}"), "w1", &format!("body {n}"))
                        .expect("append")
                })
            })
            .collect();
        let sent: Vec<Message> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();

        let inbox = store.inbox("w1").expect("inbox");
        assert_eq!(inbox.len(), SENDERS);
        let ids: HashSet<_> = inbox.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), SENDERS);
        for message in &sent {
            let stored = inbox.iter().find(|m| m.id == message.id).expect("stored");
            assert_eq!(stored.from, message.from);
            assert_eq!(stored.body, message.body);
        }
    }

    #[test]
    fn inbox_preserves_insertion_order() {
        let tmp = TestTempDir::new("mailbox-order");
        let store = MailboxStore::open(tmp.path());
        let ids: Vec<_> = ["one", "two", "three"]
            .iter()
            .map(|body| store.append("operator", "w1", body).expect("append").id)
            .collect();
        let listed: Vec<_> = store.inbox("w1").expect("inbox").into_iter().map(|m| m.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn listing_does_not_change_read_state() {
        let tmp = TestTempDir::new("mailbox-pure");
        let store = MailboxStore::open(tmp.path());
        let first = store.append("operator", "w1", "a").expect("append");
        store.append("operator", "w1", "b").expect("append");
        store.mark_read("w1", &first.id).expect("mark");

        let before = store.inbox("w1").expect("inbox");
        let unread = super::super::unread(&before);
        assert_eq!(unread.len(), 1);
        assert!(unread.iter().all(|m| !m.read));
        assert_eq!(store.inbox("w1").expect("inbox"), before);
    }

    #[test]
    fn markers_are_monotone() {
        let tmp = TestTempDir::new("mailbox-markers");
        let store = MailboxStore::open(tmp.path());
        let m = store.append("operator", "w1", "a").expect("append");

        assert_eq!(store.mark_delivered("w1", &m.id, 100).expect("first"), 100);
        assert_eq!(store.mark_delivered("w1", &m.id, 200).expect("second"), 100);
        assert!(store.mark_read("w1", &m.id).expect("read"));
        assert!(!store.mark_read("w1", &m.id).expect("read again"));

        let stored = &store.inbox("w1").expect("inbox")[0];
        assert_eq!(stored.delivered_at, Some(100));
        assert!(stored.read);
    }

    #[test]
    fn marking_unknown_message_is_not_found() {
        let tmp = TestTempDir::new("mailbox-unknown");
        let store = MailboxStore::open(tmp.path());
        store.append("operator", "w1", "a").expect("append");
        let err = store.mark_read("w1", "dead-beef-dead-beef").expect_err("unknown");
        assert!(matches!(err, MuxError::NotFound(_)));
    }

    #[test]
    fn partial_ids_do_not_match_a_message() {
        let tmp = TestTempDir::new("mailbox-partial-id");
        let store = MailboxStore::open(tmp.path());
        let m = store.append("operator", "w1", "a").expect("append");
        let (_, last_group) = m.id.rsplit_once('-').expect("grouped id");
        let (_, last_two) = m.id.split_once('-').expect("grouped id");
        let (_, last_three) = last_two.split_once('-').expect("grouped id");

        for partial in [last_group, last_three] {
            let err = store.mark_read("w1", partial).expect_err("partial id");
            assert!(matches!(err, MuxError::NotFound(_)), "got: {err}");
            let err = store.mark_delivered("w1", partial, 1).expect_err("partial id");
            assert!(matches!(err, MuxError::NotFound(_)), "got: {err}");
        }
        assert!(!tmp.child(&format!("mailbox/w1/{last_group}.read")).exists());
        assert!(!store.inbox("w1").expect("inbox")[0].read);
        assert!(store.mark_read("w1", &m.id).expect("full id"));
    }

    #[test]
    fn record_id_is_everything_after_the_timestamp() {
        assert_eq!(
            record_id("00000000000000000042-00c5-49bd-1888-ea86.json"),
            Some("00c5-49bd-1888-ea86")
        );
        assert_eq!(record_id("00000000000000000042.json"), None);
        assert_eq!(record_id("00c5-49bd-1888-ea86.read"), None);
    }

    #[test]
    fn corrupt_record_is_reported_not_skipped() {
        let tmp = TestTempDir::new("mailbox-corrupt");
        let store = MailboxStore::open(tmp.path());
        store.append("operator", "w1", "a").expect("append");
        fs::write(tmp.child("mailbox/w1/00000000000000000001-bad.json"), b"{").expect("plant");
        let err = store.inbox("w1").expect_err("corrupt");
        assert!(matches!(err, MuxError::StoreFault(_)), "got: {err}");
    }

    #[test]
    fn temp_files_and_unknown_workers_are_ignored() {
        let tmp = TestTempDir::new("mailbox-temp");
        let store = MailboxStore::open(tmp.path());
        assert!(store.inbox("nobody").expect("empty").is_empty());
        store.append("operator", "w1", "a").expect("append");
        fs::write(tmp.child("mailbox/w1/.partial.json.1.2.3.tmp"), b"{").expect("plant");
        assert_eq!(store.inbox("w1").expect("inbox").len(), 1);
    }

    #[test]
    fn recipient_must_be_a_valid_worker_id() {
        let tmp = TestTempDir::new("mailbox-recipient");
        let store = MailboxStore::open(tmp.path());
        for bad in ["../escape", "a:b", ""] {
            assert!(matches!(
                store.append("operator", bad, "x"),
                Err(MuxError::InvalidArguments(_))
            ));
        }
    }
}
