//! muxcrew: synchronous command execution and messaging for shell workers
//! living in tmux panes.
//!
//! The core never reaches for tmux implicitly. Callers hand a
//! [`tmux::Multiplexer`] to the [`directory::Directory`],
//! [`resolve::Resolver`], [`exec::ExecEngine`] and
//! [`mailbox::MessageRouter`], so every component can run against an
//! in-memory backend in tests.
//!
//! # Quick start
//!
//! ```no_run
//! use muxcrew::directory::Directory;
//! use muxcrew::exec::ExecEngine;
//! use muxcrew::registry::WorkerRegistry;
//! use muxcrew::resolve::Resolver;
//! use muxcrew::tmux::TmuxBackend;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), muxcrew::error::MuxError> {
//! let mux = TmuxBackend::new(None);
//! let state = Path::new("/tmp/muxcrew");
//! let resolver = Resolver::new(Directory::new(&mux), WorkerRegistry::open(state), "crew");
//! let (target, _created) = resolver.ensure("crew:shell").await?;
//! let engine = ExecEngine::new(&mux, state)?;
//! let result = engine.run_sync(&target.pane_id, "echo hi", Duration::from_secs(5)).await?;
//! println!("{} (exit {})", result.output, result.exit_code);
//! # Ok(())
//! # }
//! ```

pub mod build_info;
pub mod config;
pub mod directory;
pub mod error;
pub mod exec;
pub mod logging;
pub mod mailbox;
pub mod persist;
pub mod registry;
pub mod render;
pub mod resolve;
#[cfg(test)]
pub mod testsupport;
pub mod tmux;
