//! Ping command handler.

use async_trait::async_trait;
use log::debug;

use crate::commands::{
    CommandContext, CommandResult, Handler, markdown_response::format_pong,
};

/// Answers every invocation, used to check the bot is alive.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn invoke(&self, context: &CommandContext<'_>) -> anyhow::Result<CommandResult> {
        debug!("handling ping command from {}", context.sender_id);
        Ok(CommandResult::new(format_pong()))
    }
}
