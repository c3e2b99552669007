//! `exec`: synchronous command execution against a target.

use crate::app::AppContext;
use muxcrew::error::MuxError;
use muxcrew::exec::{ExecEngine, ExecutionResult};
use muxcrew::tmux::process::format_duration;
use std::time::Duration;
use tracing::warn;

pub(crate) async fn run(
    ctx: &AppContext,
    target: &str,
    command: &str,
    quiet: bool,
    timeout_ms: Option<u64>,
) -> Result<i32, MuxError> {
    let resolver = ctx.resolver();
    let (resolution, created) = resolver.ensure(target).await?;
    if !quiet {
        for resource in &created {
            ctx.renderer.activity(&format!("created {resource}"));
        }
    }

    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| ctx.config.terminal.exec_timeout());
    let engine = ExecEngine::new(&ctx.mux, &ctx.state_root())?;
    let result = engine
        .run_sync_until(&resolution.pane_id, command, timeout, interrupted())
        .await?;
    finish(&resolution.pane_id, timeout, result, quiet)
}

fn finish(
    pane_id: &str,
    timeout: Duration,
    result: ExecutionResult,
    quiet: bool,
) -> Result<i32, MuxError> {
    if result.timed_out {
        return Err(MuxError::Timeout(format!(
            "no completion signal from pane {pane_id} within {}; the command is still running",
            format_duration(timeout)
        )));
    }
    if !quiet && !result.output.is_empty() {
        println!("{}", result.output);
    }
    Ok(result.exit_code)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
}
