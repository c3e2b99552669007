//! `msg send|inbox|read`.

use crate::app::{print_json, AppContext};
use crate::cli::MsgCommand;
use muxcrew::error::MuxError;
use muxcrew::mailbox::{unread, MailboxStore, MessageRouter, SendReport};
use muxcrew::render::format_inbox;

pub(crate) async fn run(ctx: &AppContext, command: MsgCommand) -> Result<i32, MuxError> {
    let store = MailboxStore::open(&ctx.state_root());
    match command {
        MsgCommand::Send { body, to, from } => {
            let resolver = ctx.resolver();
            let router =
                MessageRouter::new(store, &resolver, &ctx.mux, ctx.config.mailbox.delivery);
            let report = router.send_message(&from, &to, &body).await?;
            Ok(report_send(ctx, &report))
        }
        MsgCommand::Inbox {
            worker,
            json,
            unread: unread_only,
        } => {
            let mut messages = store.inbox(&worker)?;
            if unread_only {
                messages = unread(&messages);
            }
            if json {
                print_json(&messages)?;
            } else {
                print!("{}", format_inbox(&messages));
            }
            Ok(0)
        }
        MsgCommand::Read { worker, ids } => {
            for id in &ids {
                if store.mark_read(&worker, id)? {
                    println!("{id} marked read");
                } else {
                    println!("{id} already read");
                }
            }
            Ok(0)
        }
    }
}

/// Print the delivered worker/message ids, or a reason line and status 1.
fn report_send(ctx: &AppContext, report: &SendReport) -> i32 {
    if report.delivered {
        println!("delivered to {} (message {})", report.worker_id, report.message_id);
        return 0;
    }
    ctx.renderer.error(&format!(
        "message {} stored for {} but not delivered: {}",
        report.message_id,
        report.worker_id,
        report.reason.as_deref().unwrap_or("unknown reason")
    ));
    1
}
