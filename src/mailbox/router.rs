//! Store-then-deliver message routing.
//!
//! A message is persisted before any delivery attempt, so a failed push
//! never loses it. Delivery is a single best-effort push to the recipient's
//! live pane; on success the store records `deliveredAt`. Typed delivery
//! takes the pane lease first, so it never lands inside a running command.

use serde::Serialize;
use tracing::{info, warn};

use super::{Message, MailboxStore};
use crate::config::DeliveryMode;
use crate::error::MuxError;
use crate::exec::token::{CorrelationToken, LeaseDir};
use crate::persist::now_unix_millis;
use crate::resolve::{ResolveOptions, Resolver};
use crate::tmux::Multiplexer;

/// Outcome of one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub delivered: bool,
    pub worker_id: String,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct MessageRouter<'a> {
    store: MailboxStore,
    resolver: &'a Resolver<'a>,
    mux: &'a dyn Multiplexer,
    delivery: DeliveryMode,
}

impl<'a> MessageRouter<'a> {
    pub fn new(
        store: MailboxStore,
        resolver: &'a Resolver<'a>,
        mux: &'a dyn Multiplexer,
        delivery: DeliveryMode,
    ) -> Self {
        Self {
            store,
            resolver,
            mux,
            delivery,
        }
    }

    /// Persist a message for `to`, then try to push it to the worker's pane.
    ///
    /// Only persistence failures are errors. An unreachable recipient yields
    /// `delivered: false` with a reason.
    pub async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<SendReport, MuxError> {
        if body.trim().is_empty() {
            return Err(MuxError::InvalidArguments("message body cannot be empty".into()));
        }
        let message = self.store.append(from, to, body)?;
        let mut report = SendReport {
            delivered: false,
            worker_id: message.to.clone(),
            message_id: message.id.clone(),
            reason: None,
        };

        match self.push(&message).await {
            Ok(pane_id) => {
                info!(to, id = %message.id, pane_id = %pane_id, "message delivered");
                let recorded =
                    self.store
                        .mark_delivered(&message.to, &message.id, now_unix_millis());
                report = settle_delivered(report, recorded);
            }
            Err(err) => {
                warn!(to, id = %message.id, error = %err, "message stored but not delivered");
                report.reason = Some(err.to_string());
            }
        }
        Ok(report)
    }

    /// Full inbox for `worker`, oldest first.
    pub fn get_inbox(&self, worker: &str) -> Result<Vec<Message>, MuxError> {
        self.store.inbox(worker)
    }

    async fn push(&self, message: &Message) -> Result<String, MuxError> {
        let target = self
            .resolver
            .resolve(&message.to, ResolveOptions::live())
            .await?;
        let sent = match self.delivery {
            DeliveryMode::Notify => {
                self.mux
                    .display_message(&target.pane_id, &notice_text(message))
                    .await
            }
            DeliveryMode::Keys => self.type_into(&target.pane_id, message).await,
        };
        sent.map_err(|e| MuxError::DeliveryFailed(format!("pane {}: {e}", target.pane_id)))?;
        Ok(target.pane_id)
    }

    /// Type the message under the pane lease; a busy pane is not typed into.
    async fn type_into(&self, pane_id: &str, message: &Message) -> Result<(), MuxError> {
        let leases = LeaseDir::open(self.store.root())?;
        let _lease = leases
            .acquire(self.mux, pane_id, &CorrelationToken::generate())
            .await?;
        self.mux.send_line(pane_id, &keys_text(message)).await
    }
}

/// A pushed message counts as delivered even if recording that fails, so the
/// caller still learns the stored message id.
fn settle_delivered(mut report: SendReport, recorded: Result<u64, MuxError>) -> SendReport {
    report.delivered = true;
    if let Err(err) = recorded {
        warn!(
            to = %report.worker_id,
            id = %report.message_id,
            error = %err,
            "delivered but not recorded"
        );
    }
    report
}

fn notice_text(message: &Message) -> String {
    format!("muxcrew: message {} from {}", message.id, message.from)
}

/// Typed delivery is a single input line, so embedded newlines become spaces.
fn keys_text(message: &Message) -> String {
    let body = message.body.replace(['\r', '\n'], " ");
    format!("[muxcrew {} from {}] {body}", message.id, message.from)
}
