//! Events command handler.

use async_trait::async_trait;
use log::debug;

use crate::{
    commands::{CommandContext, CommandResult, Handler, markdown_response::format_events},
    events::get_flags,
};

/// Shows every event flag of the current chat.
pub struct EventsHandler;

#[async_trait]
impl Handler for EventsHandler {
    async fn invoke(&self, context: &CommandContext<'_>) -> anyhow::Result<CommandResult> {
        debug!("handling events command in {}", context.jid);

        let flags = get_flags(context.flags, &context.jid).await;

        Ok(CommandResult::new(format_events(&flags)))
    }
}
