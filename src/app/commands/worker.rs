//! `worker add|rm|ls`.

use crate::app::{print_json, AppContext};
use crate::cli::WorkerCommand;
use muxcrew::error::MuxError;
use muxcrew::registry::validate_worker_id;
use muxcrew::render::format_worker_table;
use muxcrew::resolve::ResolveOptions;

pub(crate) async fn run(ctx: &AppContext, command: WorkerCommand) -> Result<i32, MuxError> {
    let registry = ctx.registry();
    match command {
        WorkerCommand::Add { id, target } => {
            validate_worker_id(&id)?;
            let resolution = ctx
                .resolver()
                .resolve(&target, ResolveOptions::live())
                .await?;
            let record =
                registry.register(&id, &resolution.pane_id, resolution.session.as_deref())?;
            println!("registered {} -> {}", record.id, record.pane_id);
            Ok(0)
        }
        WorkerCommand::Rm { id } => {
            if !registry.unregister(&id)? {
                return Err(MuxError::NotFound(format!("worker `{id}`")));
            }
            println!("removed {id}");
            Ok(0)
        }
        WorkerCommand::Ls { json } => {
            let workers = registry.list()?;
            if json {
                print_json(&workers)?;
            } else {
                print!("{}", format_worker_table(&workers));
            }
            Ok(0)
        }
    }
}
