//! CLI entry point for muxcrew.

mod app;
mod cli;

use clap::Parser;
use muxcrew::config::load_config;
use muxcrew::logging::init_logging;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    // Apply CLI overrides.
    if args.no_color {
        config.display.color = false;
    }
    if let Some(root) = args.root {
        config.mailbox.root = Some(root);
    }

    init_logging(config.display.color);
    let ctx = app::AppContext::new(config);
    let code = app::run(args.command, &ctx).await;
    std::process::exit(code);
}
