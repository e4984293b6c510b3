//! Markdown response formatters for bot commands.
//!
//! Every message the bot sends back to a chat is built here, so the wording
//! stays consistent across handlers.

use std::sync::Arc;

use crate::{
    commands::{Command, CommandStore},
    events::{FlagColumn, FlagState},
};

/// Formats the help message listing every category and its commands.
///
/// # Examples
///
/// ```
/// # use goodchild::commands::{CommandStore, markdown_response::format_help};
/// let help = format_help(&CommandStore::new(), '!');
/// assert_eq!(help, "No commands available.");
/// ```
pub fn format_help(store: &CommandStore, prefix: char) -> String {
    let categories = store.list_categories();
    if store.is_empty() || categories.is_empty() {
        return "No commands available.".to_owned();
    }

    let sections = categories
        .iter()
        .filter_map(|category| {
            let commands = store.list_by_category(category);
            if commands.is_empty() {
                return None;
            }

            let lines = commands
                .iter()
                .map(|command| format_command_line(command, prefix))
                .collect::<Vec<String>>()
                .join("\n");

            Some(format!("**{}**\n{}", category, lines))
        })
        .collect::<Vec<String>>()
        .join("\n\n");

    format!(
        "Commands:\n\n{}\n\nType `{}help <command>` for details.",
        sections, prefix
    )
}

fn format_command_line(command: &Command, prefix: char) -> String {
    match &command.description {
        Some(description) => format!("- `{}{}`: {}", prefix, command.name, description),
        None => format!("- `{}{}`", prefix, command.name),
    }
}

/// Formats the detailed help of a single command.
pub fn format_command_help(command: &Arc<Command>, prefix: char) -> String {
    let mut lines = vec![format!("**{}{}** ({})", prefix, command.name, command.category)];

    if let Some(description) = &command.description {
        lines.push(description.clone());
    }
    if let Some(usage) = &command.usage {
        lines.push(format!("Usage: `{}{}`", prefix, usage));
    }
    if !command.aliases.is_empty() {
        let aliases = command
            .aliases
            .iter()
            .map(|alias| format!("`{}{}`", prefix, alias))
            .collect::<Vec<String>>()
            .join(", ");
        lines.push(format!("Aliases: {}", aliases));
    }

    lines.join("\n")
}

/// Formats a response for an unknown command.
///
/// # Examples
///
/// ```
/// # use goodchild::commands::markdown_response::format_unknown_command;
/// let msg = format_unknown_command("dance", '!');
/// assert!(msg.contains("Unknown command"));
/// ```
pub fn format_unknown_command(token: &str, prefix: char) -> String {
    format!(
        "Unknown command `{}{}`. Type `{}help` for the list of commands.",
        prefix, token, prefix
    )
}

/// Formats the response sent when a handler fails.
pub fn format_handler_error(name: &str) -> String {
    format!(
        "Something went wrong while running `{}`, please try again later.",
        name
    )
}

pub fn format_pong() -> String {
    "Pong! The bot is alive.".to_owned()
}

fn format_state(state: FlagState) -> &'static str {
    match state {
        FlagState::Enabled => "enabled",
        FlagState::Disabled => "disabled",
        FlagState::Unset => "disabled (never configured)",
    }
}

/// Formats the current state of one flag.
pub fn format_flag_state(column: FlagColumn, state: FlagState) -> String {
    format!("**{}** is {} in this chat.", column, format_state(state))
}

/// Formats the confirmation of a flag update.
pub fn format_flag_updated(column: FlagColumn, enabled: bool) -> String {
    let state = if enabled { "enabled" } else { "disabled" };
    format!("**{}** is now {} in this chat.", column, state)
}

pub fn format_flag_update_failed(column: FlagColumn) -> String {
    format!(
        "Unable to update **{}**, please try again later.",
        column
    )
}

/// Formats the usage hint of a toggle command.
pub fn format_invalid_toggle(invoked_as: &str, prefix: char) -> String {
    format!("Invalid argument. Usage: `{}{} on|off`", prefix, invoked_as)
}

/// Formats every flag of a chat.
pub fn format_events(flags: &[(FlagColumn, FlagState)]) -> String {
    let lines = flags
        .iter()
        .map(|(column, state)| format!("- **{}**: {}", column, format_state(*state)))
        .collect::<Vec<String>>()
        .join("\n");

    format!("Group events:\n\n{}", lines)
}
