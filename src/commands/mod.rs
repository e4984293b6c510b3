//! Command registry, loading and dispatch.
//!
//! This module provides everything needed to turn a chat message into a
//! handler invocation.
//!
//! # Overview
//!
//! 1. **Definition** - Command manifests (YAML files) describe a command's name,
//!    category, aliases and the identifier of the compiled-in handler it uses
//! 2. **Loading** - The [`CommandLoader`] walks the manifest directory and binds
//!    each manifest to a handler from the [`HandlerCatalog`]
//! 3. **Registration** - The [`CommandStore`] indexes commands by name, alias
//!    and category
//! 4. **Dispatch** - The [`Dispatcher`] parses a message, resolves the invoked
//!    token and calls the handler
//!
//! # Architecture
//!
//! ```text
//! commands/**/*.yaml ──► CommandLoader ──► CommandStore
//!                             ▲                 │
//!                       HandlerCatalog          │ get(name | alias)
//!                                               ▼
//! chat message ───────────► Dispatcher ──► Handler::invoke ──► CommandResult
//! ```
//!
//! # Module Organization
//!
//! - [`store`] - Name, alias and category indices
//! - [`loader`] - Directory traversal and manifest parsing
//! - [`dispatcher`] - Message parsing and handler routing
//! - [`actions`] - Built-in handlers and the handler catalog
//! - [`markdown_response`] - Response formatting

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::events::FlagStorage;

mod actions;
mod dispatcher;
mod loader;
mod markdown_response;
mod store;

pub use crate::commands::actions::HandlerCatalog;
pub use crate::commands::dispatcher::Dispatcher;
pub use crate::commands::loader::CommandLoader;
pub use crate::commands::store::CommandStore;

/// Category assigned to commands that do not declare one.
pub const DEFAULT_CATEGORY: &str = "Misc";

/// Executable behavior bound to a command.
///
/// Handlers are compiled into the binary and referenced from manifests by
/// identifier (see [`HandlerCatalog`]).
#[async_trait]
pub trait Handler: Send + Sync {
    /// Runs the command for one invocation.
    ///
    /// An `Err` is logged by the dispatcher and answered with a generic
    /// failure message in the chat.
    async fn invoke(&self, context: &CommandContext<'_>) -> anyhow::Result<CommandResult>;
}

/// A registered, invocable bot command.
///
/// Commands are shared as `Arc<Command>` so that a lookup by name and a
/// lookup by alias return the very same value.
pub struct Command {
    /// Canonical name, unique within a [`CommandStore`]
    pub name: String,
    /// Grouping label used by the help command
    pub category: String,
    /// Alternate names resolving to [`Command::name`]
    pub aliases: Vec<String>,
    /// One line description shown in help
    pub description: Option<String>,
    /// Usage hint shown in help, e.g. `welcome on|off`
    pub usage: Option<String>,
    /// Behavior run on invocation
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("aliases", &self.aliases)
            .field("description", &self.description)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Input of [`CommandStore::register`].
///
/// `name` and `category` are optional here because manifests may omit them:
/// a missing name is rejected and a missing category falls back to
/// [`DEFAULT_CATEGORY`].
#[derive(Clone)]
pub struct CommandDefinition {
    pub name: Option<String>,
    pub category: Option<String>,
    pub aliases: Vec<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
    pub handler: Arc<dyn Handler>,
}

#[cfg(test)]
impl CommandDefinition {
    /// Creates a definition with a name and a handler and nothing else.
    pub fn new(name: &str, handler: Arc<dyn Handler>) -> Self {
        CommandDefinition {
            name: Some(name.to_owned()),
            category: None,
            aliases: vec![],
            description: None,
            usage: None,
            handler,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|alias| alias.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}

/// Runtime context for one command invocation.
///
/// Built by the [`Dispatcher`] for every message that resolves to a command.
pub struct CommandContext<'a> {
    /// Chat or group identifier the message was sent in
    pub jid: String,
    /// Identifier of the message author
    pub sender_id: String,
    /// Token the user typed (the command name or one of its aliases)
    pub invoked_as: String,
    /// Arguments following the token
    pub arguments: Vec<String>,
    /// Command prefix, used when a handler formats usage hints
    pub prefix: char,
    /// Registry the command was resolved from
    pub commands: &'a CommandStore,
    /// Per-chat event flags
    pub flags: &'a dyn FlagStorage,
}

/// Result of a command invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult {
    /// Markdown-formatted message to send back to the chat
    pub response: String,
}

impl CommandResult {
    pub fn new(response: String) -> Self {
        CommandResult { response }
    }
}

/// Errors raised while registering a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The definition has no name, or an empty one.
    #[error("command must have a name")]
    MissingName,
}

/// Errors raised while dispatching a message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Message is not a command (silent error, no response is sent)
    #[error("message is not a command")]
    NotForBot,
}
