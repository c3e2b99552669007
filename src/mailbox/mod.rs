//! Durable per-worker mailboxes and best-effort live delivery.

mod router;
mod store;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub use router::{MessageRouter, SendReport};
pub use store::MailboxStore;

/// Sender recorded when `msg send` gets no `--from`.
pub const DEFAULT_SENDER: &str = "operator";

/// A mailbox message. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<u64>,
    #[serde(default)]
    pub read: bool,
}

/// Unread subset of an inbox, in the same order.
pub fn unread(messages: &[Message]) -> Vec<Message> {
    messages.iter().filter(|m| !m.read).cloned().collect()
}

/// Opaque message id (`xxxx-xxxx-xxxx-xxxx`).
pub fn generate_message_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let hex = format!("{:016x}", u64::from_be_bytes(bytes));
    format!(
        "{}-{}-{}-{}",
        &hex[0..4],
        &hex[4..8],
        &hex[8..12],
        &hex[12..16]
    )
}
