//! Binary-local application orchestration.
//!
//! `main.rs` parses arguments and loads configuration; each subcommand's
//! wiring lives under `commands` so handlers read top to bottom.

mod commands;

use crate::cli::Command;
use muxcrew::config::Config;
use muxcrew::directory::Directory;
use muxcrew::error::MuxError;
use muxcrew::registry::WorkerRegistry;
use muxcrew::render::Renderer;
use muxcrew::resolve::Resolver;
use muxcrew::tmux::TmuxBackend;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a handler needs for one invocation.
pub(crate) struct AppContext {
    pub config: Config,
    pub renderer: Renderer,
    pub mux: TmuxBackend,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let renderer = Renderer::new(config.display.color);
        let mux = TmuxBackend::new(config.tmux.socket.clone());
        Self {
            config,
            renderer,
            mux,
        }
    }

    pub fn state_root(&self) -> PathBuf {
        self.config.state_root()
    }

    pub fn registry(&self) -> WorkerRegistry {
        WorkerRegistry::open(&self.state_root())
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            Directory::new(&self.mux),
            self.registry(),
            &self.config.tmux.default_session,
        )
    }
}

/// Run one subcommand and return the process exit status.
pub(crate) async fn run(command: Command, ctx: &AppContext) -> i32 {
    match dispatch(command, ctx).await {
        Ok(code) => code,
        Err(err) => {
            ctx.renderer.error(&err.to_string());
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, ctx: &AppContext) -> Result<i32, MuxError> {
    match command {
        Command::Exec {
            target,
            command,
            quiet,
            timeout_ms,
        } => commands::exec::run(ctx, &target, &command.join(" "), quiet, timeout_ms).await,
        Command::Ls { json } => commands::list_sessions(ctx, json).await,
        Command::Msg(cmd) => commands::msg::run(ctx, cmd).await,
        Command::Resolve { target, json } => commands::resolve_target(ctx, &target, json).await,
        Command::Worker(cmd) => commands::worker::run(ctx, cmd).await,
    }
}

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), MuxError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MuxError::Backend(format!("failed to encode json output: {e}")))?;
    println!("{text}");
    Ok(())
}
