//! Subcommand handlers.

pub(crate) mod exec;
pub(crate) mod msg;
pub(crate) mod worker;

use super::{print_json, AppContext};
use muxcrew::error::MuxError;
use muxcrew::render::{format_resolution, format_session_table};
use muxcrew::resolve::ResolveOptions;
use muxcrew::tmux::Multiplexer;

/// `ls`: session listing, tabular or JSON.
pub(crate) async fn list_sessions(ctx: &AppContext, json: bool) -> Result<i32, MuxError> {
    let sessions = ctx.mux.list_sessions().await?;
    if json {
        print_json(&sessions)?;
    } else {
        print!("{}", format_session_table(&sessions));
    }
    Ok(0)
}

/// `resolve`: report which strategy binds a descriptor, with liveness checked.
pub(crate) async fn resolve_target(
    ctx: &AppContext,
    target: &str,
    json: bool,
) -> Result<i32, MuxError> {
    let resolution = ctx
        .resolver()
        .resolve(target, ResolveOptions::live())
        .await?;
    if json {
        print_json(&resolution)?;
    } else {
        print!("{}", format_resolution(&resolution));
    }
    Ok(0)
}
