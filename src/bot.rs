//! The interactive bot loop.

use tracing::{debug, instrument};

use crate::{base::types::Void, fatal, interaction, runtime::Runtime};

/// Launch the bot loop.
///
/// Fire-and-forget: the loop reads the inbound chat stream for the rest
/// of the process lifetime and reports failures through the failure
/// funnel.
pub fn start(runtime: Runtime) {
    fatal::spawn("bot loop", run(runtime));
}

#[instrument(skip_all)]
async fn run(runtime: Runtime) -> Void {
    let chat = runtime.chat.clone();

    chat.listen(Box::new(move |message| {
        // Drop our own messages so feed announcements cannot loop back.
        if message.sender == runtime.chat.bot_username() {
            return;
        }

        if !interaction::command::is_command(&message.body) {
            debug!("Ignoring non-command message");
            return;
        }

        interaction::chat_event::handle_chat_event(
            message,
            runtime.config.clone(),
            runtime.db.clone(),
            runtime.tracker.clone(),
            runtime.chat.clone(),
        );
    }))
    .await
}
