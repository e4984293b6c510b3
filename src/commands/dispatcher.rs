//! Message parsing and command dispatch.
//!
//! This module provides the [`Dispatcher`], which turns a chat message into a
//! handler invocation.
//!
//! # Flow
//!
//! ```text
//! chat message → parse() → Invocation → CommandStore::get() → Handler::invoke() → CommandResult
//! ```
//!
//! Messages that are not commands are ignored silently. Every other outcome,
//! including unknown commands and handler failures, produces a response for
//! the chat.

use command_parser::Parser;
use log::{debug, error};

use crate::{
    commands::{
        CommandContext, CommandResult, CommandStore, DispatchError,
        markdown_response::{format_handler_error, format_unknown_command},
    },
    events::FlagStorage,
};

/// A parsed command invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Command name or alias, lowercased
    pub token: String,
    /// Arguments following the token
    pub arguments: Vec<String>,
}

/// Parses chat messages and routes them to command handlers.
///
/// # Examples
///
/// ```no_run
/// # use goodchild::commands::{CommandStore, Dispatcher};
/// # use goodchild::events::FlagStorage;
/// # async fn example(store: &CommandStore, flags: &dyn FlagStorage) {
/// let dispatcher = Dispatcher::new('!');
///
/// match dispatcher.dispatch(store, flags, "123@g.us", "33600000000@s.whatsapp.net", "!welcome on").await {
///     Ok(result) => println!("Bot response: {}", result.response),
///     Err(_) => {} // not a command, stay silent
/// }
/// # }
/// ```
pub struct Dispatcher {
    /// Command parser for processing user commands
    parser: Parser,
    /// Character starting a command
    prefix: char,
}

impl Dispatcher {
    /// Creates a dispatcher recognizing commands starting with `prefix`.
    pub fn new(prefix: char) -> Self {
        let parser = Parser::new(prefix, '-');
        Dispatcher { parser, prefix }
    }

    /// Parses a message body into an [`Invocation`].
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotForBot`] if the message is not a command.
    pub fn parse(&self, body: &str) -> Result<Invocation, DispatchError> {
        let body = body.trim();
        if !body.starts_with(self.prefix) {
            return Err(DispatchError::NotForBot);
        }

        // The parser ignores the last word, so a dummy word is appended
        let body = body.to_string() + " dummy";

        let command = match self.parser.parse(&body) {
            Ok(command) => command,
            Err(_) => return Err(DispatchError::NotForBot),
        };

        let token = command.name.to_lowercase();
        if token.is_empty() {
            return Err(DispatchError::NotForBot);
        }

        debug!("parsed command {} {:?}", token, command.arguments);

        Ok(Invocation {
            token,
            arguments: command.arguments.clone(),
        })
    }

    /// Parses a message and runs the matching command.
    ///
    /// # Returns
    ///
    /// * `Ok(CommandResult)` - Response to send to the chat: the handler
    ///   output, an unknown command notice or a failure notice
    /// * `Err(DispatchError::NotForBot)` - The message is not a command and
    ///   must not be answered
    pub async fn dispatch(
        &self,
        commands: &CommandStore,
        flags: &dyn FlagStorage,
        jid: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<CommandResult, DispatchError> {
        let invocation = self.parse(body)?;

        let Some(command) = commands.get(&invocation.token) else {
            debug!("unknown command {}", invocation.token);
            return Ok(CommandResult::new(format_unknown_command(
                &invocation.token,
                self.prefix,
            )));
        };

        let context = CommandContext {
            jid: jid.to_owned(),
            sender_id: sender_id.to_owned(),
            invoked_as: invocation.token,
            arguments: invocation.arguments,
            prefix: self.prefix,
            commands,
            flags,
        };

        match command.handler.invoke(&context).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("command {} failed in {}: {:#}", command.name, jid, e);
                Ok(CommandResult::new(format_handler_error(&command.name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        commands::{
            CommandDefinition, Handler,
            actions::{EventToggleHandler, PingHandler},
            markdown_response::{format_flag_updated, format_pong},
        },
        events::{FlagColumn, MockFlagStorage},
    };
    use mockall::predicate::eq;

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        async fn invoke(&self, _context: &CommandContext<'_>) -> anyhow::Result<CommandResult> {
            anyhow::bail!("boom")
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn invoke(&self, context: &CommandContext<'_>) -> anyhow::Result<CommandResult> {
            Ok(CommandResult::new(format!(
                "{}:{}",
                context.invoked_as,
                context.arguments.join(",")
            )))
        }
    }

    fn store() -> CommandStore {
        let mut store = CommandStore::new();
        store
            .register(CommandDefinition::new("ping", Arc::new(PingHandler)).with_aliases(&["alive"]))
            .unwrap();
        store
            .register(
                CommandDefinition::new("welcome", Arc::new(EventToggleHandler::new(FlagColumn::Welcome)))
                    .with_aliases(&["bienvenue"]),
            )
            .unwrap();
        store
            .register(CommandDefinition::new("crash", Arc::new(FailingHandler)))
            .unwrap();
        store
            .register(CommandDefinition::new("echo", Arc::new(EchoHandler)).with_aliases(&["say"]))
            .unwrap();
        store
    }

    #[test]
    fn test_parse_command_with_arguments() {
        let dispatcher = Dispatcher::new('!');

        let invocation = dispatcher.parse("!welcome on").unwrap();

        assert_eq!(invocation.token, "welcome");
        assert_eq!(invocation.arguments, vec!["on"]);
    }

    #[test]
    fn test_parse_command_without_arguments() {
        let dispatcher = Dispatcher::new('!');

        let invocation = dispatcher.parse("!ping").unwrap();

        assert_eq!(invocation.token, "ping");
        assert!(invocation.arguments.is_empty());
    }

    #[test]
    fn test_parse_lowercases_token() {
        let dispatcher = Dispatcher::new('!');

        assert_eq!(dispatcher.parse("!PING").unwrap().token, "ping");
    }

    #[test]
    fn test_parse_ignores_regular_messages() {
        let dispatcher = Dispatcher::new('!');

        assert_eq!(dispatcher.parse("hello there"), Err(DispatchError::NotForBot));
        assert_eq!(dispatcher.parse(""), Err(DispatchError::NotForBot));
        assert_eq!(dispatcher.parse(".ping"), Err(DispatchError::NotForBot));
    }

    #[test]
    fn test_parse_custom_prefix() {
        let dispatcher = Dispatcher::new('.');

        assert_eq!(dispatcher.parse(".ping").unwrap().token, "ping");
        assert_eq!(dispatcher.parse("!ping"), Err(DispatchError::NotForBot));
    }

    #[tokio::test]
    async fn test_dispatch_by_name_and_alias() {
        let store = store();
        let flags = MockFlagStorage::new();
        let dispatcher = Dispatcher::new('!');

        let by_name = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "!ping")
            .await
            .unwrap();
        let by_alias = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "!alive")
            .await
            .unwrap();

        assert_eq!(by_name.response, format_pong());
        assert_eq!(by_name, by_alias);
    }

    #[tokio::test]
    async fn test_dispatch_mixed_case_name_and_alias() {
        let mut store = CommandStore::new();
        store
            .register(CommandDefinition::new("Ping", Arc::new(PingHandler)).with_aliases(&["Alive"]))
            .unwrap();
        let flags = MockFlagStorage::new();
        let dispatcher = Dispatcher::new('!');

        for body in ["!Ping", "!ping", "!PING", "!Alive", "!alive"] {
            let result = dispatcher
                .dispatch(&store, &flags, "123@g.us", "user", body)
                .await
                .unwrap();
            assert_eq!(result.response, format_pong(), "{}", body);
        }
    }

    #[tokio::test]
    async fn test_dispatch_passes_invocation_to_handler() {
        let store = store();
        let flags = MockFlagStorage::new();
        let dispatcher = Dispatcher::new('!');

        let result = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "!say hello world")
            .await
            .unwrap();

        assert_eq!(result.response, "say:hello,world");
    }

    #[tokio::test]
    async fn test_dispatch_toggle_uses_chat_jid() {
        let store = store();
        let mut flags = MockFlagStorage::new();
        flags
            .expect_write_flag()
            .with(eq("123@g.us"), eq(FlagColumn::Welcome), eq("oui"))
            .times(1)
            .returning(|_, _, _| true);
        let dispatcher = Dispatcher::new('!');

        let result = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "!bienvenue on")
            .await
            .unwrap();

        assert_eq!(result.response, format_flag_updated(FlagColumn::Welcome, true));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_command() {
        let store = store();
        let flags = MockFlagStorage::new();
        let dispatcher = Dispatcher::new('!');

        let result = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "!dance")
            .await
            .unwrap();

        assert_eq!(result.response, format_unknown_command("dance", '!'));
    }

    #[tokio::test]
    async fn test_dispatch_handler_failure_is_reported_to_chat() {
        let store = store();
        let flags = MockFlagStorage::new();
        let dispatcher = Dispatcher::new('!');

        let result = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "!crash")
            .await
            .unwrap();

        assert_eq!(result.response, format_handler_error("crash"));
    }

    #[tokio::test]
    async fn test_dispatch_regular_message_is_silent() {
        let store = store();
        let flags = MockFlagStorage::new();
        let dispatcher = Dispatcher::new('!');

        let result = dispatcher
            .dispatch(&store, &flags, "123@g.us", "user", "good morning")
            .await;

        assert_eq!(result, Err(DispatchError::NotForBot));
    }
}
