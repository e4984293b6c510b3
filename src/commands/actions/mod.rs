//! Built-in command handlers.
//!
//! Handlers are compiled into the binary and looked up by identifier from
//! the command manifests through the [`HandlerCatalog`].
//!
//! # Available Handlers
//!
//! | Identifier | Handler |
//! |------------|---------|
//! | `help` | [`HelpHandler`] - list commands or describe one |
//! | `ping` | [`PingHandler`] - liveness answer |
//! | `welcome`, `goodbye`, `promote`, `demote` | [`EventToggleHandler`] - show or switch a chat flag |
//! | `events` | [`EventsHandler`] - show every chat flag |

use std::{collections::HashMap, sync::Arc};

use crate::{commands::Handler, events::FlagColumn};

mod events;
mod help;
mod ping;
mod toggle;

pub use crate::commands::actions::{
    events::EventsHandler, help::HelpHandler, ping::PingHandler, toggle::EventToggleHandler,
};

/// Compiled-in handlers, keyed by identifier.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        HandlerCatalog::default()
    }

    /// Creates a catalog holding every built-in handler.
    pub fn builtin() -> Self {
        let mut catalog = HandlerCatalog::new();
        catalog.insert("help", Arc::new(HelpHandler));
        catalog.insert("ping", Arc::new(PingHandler));
        catalog.insert("events", Arc::new(EventsHandler));
        for column in FlagColumn::ALL {
            catalog.insert(column.as_str(), Arc::new(EventToggleHandler::new(column)));
        }
        catalog
    }

    /// Adds a handler, replacing any handler with the same identifier.
    pub fn insert(&mut self, id: &str, handler: Arc<dyn Handler>) {
        self.handlers.insert(id.to_owned(), handler);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(id).cloned()
    }

    /// Returns every identifier, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::{
        commands::{CommandContext, CommandStore},
        events::FlagStorage,
    };

    pub fn context<'a>(
        commands: &'a CommandStore,
        flags: &'a dyn FlagStorage,
        invoked_as: &str,
        arguments: &[&str],
    ) -> CommandContext<'a> {
        CommandContext {
            jid: "123@g.us".to_string(),
            sender_id: "33600000000@s.whatsapp.net".to_string(),
            invoked_as: invoked_as.to_string(),
            arguments: arguments.iter().map(|argument| argument.to_string()).collect(),
            prefix: '!',
            commands,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_ids() {
        let catalog = HandlerCatalog::builtin();

        assert_eq!(
            catalog.ids(),
            vec!["demote", "events", "goodbye", "help", "ping", "promote", "welcome"]
        );
        assert!(catalog.get("help").is_some());
        assert!(catalog.get("dance").is_none());
    }

    #[test]
    fn test_insert_replaces_handler() {
        let mut catalog = HandlerCatalog::new();
        let first: Arc<dyn Handler> = Arc::new(PingHandler);
        let second: Arc<dyn Handler> = Arc::new(HelpHandler);
        catalog.insert("x", Arc::clone(&first));
        catalog.insert("x", Arc::clone(&second));

        assert!(Arc::ptr_eq(&catalog.get("x").unwrap(), &second));
        assert_eq!(catalog.ids().len(), 1);
    }
}
