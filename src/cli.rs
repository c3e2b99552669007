//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};
use muxcrew::build_info::{HELP_BUILD_METADATA, LONG_VERSION};
use muxcrew::mailbox::DEFAULT_SENDER;
use std::path::PathBuf;

/// Drive shell workers in tmux panes and pass them messages.
#[derive(Debug, Parser)]
#[command(name = "muxcrew", version = LONG_VERSION, after_help = HELP_BUILD_METADATA)]
pub struct Args {
    /// Path to config file (default: ./muxcrew.toml or ~/.config/muxcrew/muxcrew.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// State root for mailboxes, workers and pane leases.
    #[arg(long = "root", global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Disable color output.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a command in a pane and wait for it to finish.
    ///
    /// Exits with the command's own status. A `session:window` or bare
    /// session target is created when missing.
    Exec {
        /// `session`, `session:window`, worker id, or pane index.
        target: String,

        /// Command line to run; multiple words are joined with spaces.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Suppress creation notices and captured output.
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,

        /// Override the configured wait bound.
        #[arg(long = "timeout-ms", value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
        timeout_ms: Option<u64>,
    },

    /// List multiplexer sessions.
    Ls {
        #[arg(long = "json")]
        json: bool,
    },

    /// Send and read worker messages.
    #[command(subcommand)]
    Msg(MsgCommand),

    /// Show how a target descriptor resolves.
    Resolve {
        target: String,

        #[arg(long = "json")]
        json: bool,
    },

    /// Manage the worker registry.
    #[command(subcommand)]
    Worker(WorkerCommand),
}

#[derive(Debug, Subcommand)]
pub enum MsgCommand {
    /// Store a message for a worker and try to deliver it live.
    Send {
        body: String,

        /// Recipient worker id.
        #[arg(long = "to")]
        to: String,

        /// Sender name recorded on the message.
        #[arg(long = "from", default_value = DEFAULT_SENDER)]
        from: String,
    },

    /// List a worker's messages, oldest first.
    Inbox {
        worker: String,

        #[arg(long = "json")]
        json: bool,

        /// Only show unread messages.
        #[arg(long = "unread")]
        unread: bool,
    },

    /// Mark messages read.
    Read {
        worker: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Register a worker id for the pane a target resolves to.
    Add { id: String, target: String },

    /// Remove a worker id.
    Rm { id: String },

    /// List registered workers.
    Ls {
        #[arg(long = "json")]
        json: bool,
    },
}
