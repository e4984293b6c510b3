//! Help command handler.
//!
//! Without argument, lists every category with its commands. With a command
//! name or alias as argument, describes that command.

use async_trait::async_trait;
use log::debug;

use crate::commands::{
    CommandContext, CommandResult, Handler,
    markdown_response::{format_command_help, format_help, format_unknown_command},
};

pub struct HelpHandler;

#[async_trait]
impl Handler for HelpHandler {
    async fn invoke(&self, context: &CommandContext<'_>) -> anyhow::Result<CommandResult> {
        debug!("handling help command");

        let response = match context.arguments.first() {
            None => format_help(context.commands, context.prefix),
            Some(token) => {
                let token = token.trim_start_matches(context.prefix).to_lowercase();
                match context.commands.get(&token) {
                    Some(command) => format_command_help(&command, context.prefix),
                    None => format_unknown_command(&token, context.prefix),
                }
            }
        };

        Ok(CommandResult::new(response))
    }
}
