//! Event toggle command handler.
//!
//! One handler instance per flag column. `!welcome` reports the current
//! state of the flag in the chat, `!welcome on` and `!welcome off` switch it.

use async_trait::async_trait;
use log::{debug, info};

use crate::{
    commands::{
        CommandContext, CommandResult, Handler,
        markdown_response::{
            format_flag_state, format_flag_update_failed, format_flag_updated,
            format_invalid_toggle,
        },
    },
    events::{FlagColumn, flag_state, set_enabled},
};

/// Shows or switches one event flag of the current chat.
pub struct EventToggleHandler {
    column: FlagColumn,
}

impl EventToggleHandler {
    pub fn new(column: FlagColumn) -> Self {
        EventToggleHandler { column }
    }
}

/// Parses an on/off argument. French values are accepted since they are the
/// values stored in the table.
fn parse_switch(argument: &str) -> Option<bool> {
    match argument.to_lowercase().as_str() {
        "on" | "oui" | "enable" | "yes" => Some(true),
        "off" | "non" | "disable" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl Handler for EventToggleHandler {
    async fn invoke(&self, context: &CommandContext<'_>) -> anyhow::Result<CommandResult> {
        debug!("handling {} command in {}", self.column, context.jid);

        let Some(argument) = context.arguments.first() else {
            let state = flag_state(context.flags, &context.jid, self.column).await;
            return Ok(CommandResult::new(format_flag_state(self.column, state)));
        };

        let Some(enabled) = parse_switch(argument) else {
            return Ok(CommandResult::new(format_invalid_toggle(
                &context.invoked_as,
                context.prefix,
            )));
        };

        let response = if set_enabled(context.flags, &context.jid, self.column, enabled).await {
            info!(
                "{} set {} to {} in {}",
                context.sender_id, self.column, enabled, context.jid
            );
            format_flag_updated(self.column, enabled)
        } else {
            format_flag_update_failed(self.column)
        };

        Ok(CommandResult::new(response))
    }
}
