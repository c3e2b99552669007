//! Synchronous command execution inside a pane.
//!
//! Completion is detected with the multiplexer's blocking named-channel wait,
//! never by re-reading pane contents. Exactly one wait on the request's own
//! channel is issued, bounded by the request timeout and raced against an
//! optional cancellation future.

pub mod script;
pub mod token;

use std::future::Future;
use std::path::Path;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::error::MuxError;
use crate::tmux::process::format_duration;
use crate::tmux::{Multiplexer, PaneCursor};

use script::{composite_instruction, output_region, parse_payload, splice_tail, trim_capture};
use token::{CorrelationToken, LeaseDir, PaneLease};

/// Bound on consuming an orphan's channel, which is already signalled.
const ORPHAN_WAIT: Duration = Duration::from_secs(1);

/// One synchronous execution against a pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub pane_id: String,
    pub command: String,
    pub timeout: Duration,
    pub token: CorrelationToken,
}

impl ExecutionRequest {
    pub fn new(pane_id: &str, command: &str, timeout: Duration) -> Self {
        Self {
            pane_id: pane_id.to_string(),
            command: command.to_string(),
            timeout,
            token: CorrelationToken::generate(),
        }
    }
}

/// Outcome of a finished or abandoned execution.
///
/// `exit_code` is only meaningful when `timed_out` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl ExecutionResult {
    fn timed_out() -> Self {
        Self {
            output: String::new(),
            exit_code: -1,
            timed_out: true,
        }
    }
}

/// Runs commands in panes and blocks until their completion signal.
pub struct ExecEngine<'a> {
    mux: &'a dyn Multiplexer,
    leases: LeaseDir,
}

impl<'a> ExecEngine<'a> {
    /// Engine whose pane leases live under `state_root`.
    pub fn new(mux: &'a dyn Multiplexer, state_root: &Path) -> Result<Self, MuxError> {
        Ok(Self {
            mux,
            leases: LeaseDir::open(state_root)?,
        })
    }

    /// Run `command` in `pane_id`, waiting at most `timeout_limit`.
    pub async fn run_sync(
        &self,
        pane_id: &str,
        command: &str,
        timeout_limit: Duration,
    ) -> Result<ExecutionResult, MuxError> {
        self.run_sync_until(pane_id, command, timeout_limit, std::future::pending())
            .await
    }

    /// Like [`ExecEngine::run_sync`], but returns `Cancelled` as soon as
    /// `cancel` resolves. The waiter is dropped and the command keeps running
    /// in the pane, which stays leased until the command's trailer frees it.
    pub async fn run_sync_until<C>(
        &self,
        pane_id: &str,
        command: &str,
        timeout_limit: Duration,
        cancel: C,
    ) -> Result<ExecutionResult, MuxError>
    where
        C: Future<Output = ()>,
    {
        if command.trim().is_empty() {
            return Err(MuxError::InvalidArguments("command cannot be empty".into()));
        }
        let request = ExecutionRequest::new(pane_id, command, timeout_limit);
        let lease = self
            .leases
            .acquire(self.mux, &request.pane_id, &request.token)
            .await?;
        self.sweep_orphans(&lease).await;

        let before = self.mux.pane_cursor(&request.pane_id).await?;
        let line = composite_instruction(
            &request.command,
            &request.pane_id,
            &request.token,
            lease.path(),
        );
        self.mux.send_line(&request.pane_id, &line).await?;
        info!(
            pane_id = %request.pane_id,
            token = request.token.as_str(),
            timeout = %format_duration(request.timeout),
            "command injected"
        );

        let channel = request.token.channel();
        tokio::select! {
            biased;
            _ = cancel => {
                warn!(pane_id = %request.pane_id, token = request.token.as_str(), "wait cancelled");
                lease.keep();
                return Err(MuxError::Cancelled);
            }
            waited = timeout(request.timeout, self.mux.wait_for(&channel)) => match waited {
                Ok(signal) => signal?,
                Err(_) => {
                    warn!(
                        pane_id = %request.pane_id,
                        token = request.token.as_str(),
                        "no completion signal before timeout"
                    );
                    lease.keep();
                    return Ok(ExecutionResult::timed_out());
                }
            },
        }

        let payload = self
            .mux
            .take_buffer(&request.token.status_buffer())
            .await?
            .ok_or_else(|| {
                MuxError::Backend(format!(
                    "completion signal for {} arrived without a status payload",
                    request.pane_id
                ))
            })?;
        let (exit_code, done) = parse_payload(&payload).ok_or_else(|| {
            MuxError::Backend(format!("unparseable exit status `{}`", payload.trim()))
        })?;

        let view = self.mux.pane_cursor(&request.pane_id).await?;
        // Without the trailer's cursor, the current row may already hold the prompt.
        let done = done.unwrap_or(PaneCursor {
            cursor_x: 0,
            ..view
        });
        let output = match output_region(before, done, view.history_size) {
            Some(region) => {
                let mut capture = self
                    .mux
                    .capture(&request.pane_id, region.start, region.end)
                    .await?;
                if let Some((row, columns)) = region.tail {
                    let tail = self.mux.capture(&request.pane_id, row, row).await?;
                    capture = splice_tail(&capture, &tail, columns);
                }
                trim_capture(&capture)
            }
            None => String::new(),
        };
        debug!(pane_id = %request.pane_id, exit_code, "command completed");
        drop(lease);

        Ok(ExecutionResult {
            output,
            exit_code,
            timed_out: false,
        })
    }

    /// Delete the status buffers and woken channels that earlier timed-out or
    /// cancelled requests on this pane left behind.
    ///
    /// Holding the lease means their trailers have run to the end, so a
    /// present buffer implies its channel was already signalled and the wait
    /// returns at once.
    async fn sweep_orphans(&self, lease: &PaneLease) {
        for token in lease.take_orphans() {
            match self.mux.take_buffer(&token.status_buffer()).await {
                Ok(Some(_)) => {
                    let consumed = timeout(ORPHAN_WAIT, self.mux.wait_for(&token.channel())).await;
                    if !matches!(consumed, Ok(Ok(()))) {
                        warn!(token = token.as_str(), "orphaned wait channel not consumed");
                    }
                }
                Ok(None) => debug!(token = token.as_str(), "orphaned request left no buffer"),
                Err(e) => warn!(token = token.as_str(), error = %e, "failed to clear orphaned buffer"),
            }
        }
    }
}
