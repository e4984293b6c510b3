//! In-memory command registry.
//!
//! [`CommandStore`] indexes commands by name, keeps an alias to name mapping
//! and the set of categories seen so far.
//!
//! Names and aliases are case-insensitive: they are stored lowercased and
//! lookups lowercase the identifier.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use log::{info, warn};

use crate::commands::{Command, CommandDefinition, DEFAULT_CATEGORY, RegistrationError};

/// Registry of commands, keyed by name, with alias and category indices.
///
/// The store is filled during startup by the
/// [`CommandLoader`](crate::commands::CommandLoader) and is read-only
/// afterwards, so it is shared behind an `Arc` without locking.
///
/// Listing operations return snapshots sorted by command name.
#[derive(Debug, Default)]
pub struct CommandStore {
    /// Commands indexed by name
    commands: HashMap<String, Arc<Command>>,
    /// Alias to command name
    aliases: HashMap<String, String>,
    /// Every category a registered command declared
    categories: BTreeSet<String>,
}

impl CommandStore {
    pub fn new() -> Self {
        CommandStore::default()
    }

    /// Registers a command.
    ///
    /// The name and aliases are trimmed and lowercased. The command category
    /// defaults to [`DEFAULT_CATEGORY`]. A command reusing
    /// an already registered name or alias replaces the previous owner: the
    /// last registration wins and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::MissingName`] if the definition has no
    /// name. The store is left untouched in that case.
    pub fn register(
        &mut self,
        definition: CommandDefinition,
    ) -> Result<Arc<Command>, RegistrationError> {
        let name = match definition.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_lowercase(),
            _ => return Err(RegistrationError::MissingName),
        };
        let category = definition
            .category
            .filter(|category| !category.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());

        let command = Arc::new(Command {
            name: name.clone(),
            category: category.clone(),
            aliases: definition
                .aliases
                .iter()
                .map(|alias| alias.trim().to_lowercase())
                .filter(|alias| !alias.is_empty())
                .collect(),
            description: definition.description,
            usage: definition.usage,
            handler: definition.handler,
        });

        if self
            .commands
            .insert(name.clone(), Arc::clone(&command))
            .is_some()
        {
            warn!("command {} was already registered, replacing it", name);
        }
        self.categories.insert(category);

        for alias in &command.aliases {
            match self.aliases.insert(alias.clone(), name.clone()) {
                Some(previous) if previous != name => {
                    warn!("alias {} moved from command {} to {}", alias, previous, name);
                }
                _ => {}
            }
        }

        info!("registered command {}", name);

        Ok(command)
    }

    /// Looks a command up by name, then by alias, ignoring case.
    pub fn get(&self, identifier: &str) -> Option<Arc<Command>> {
        let identifier = identifier.to_lowercase();
        self.commands
            .get(&identifier)
            .or_else(|| {
                self.aliases
                    .get(&identifier)
                    .and_then(|name| self.commands.get(name))
            })
            .cloned()
    }

    /// Returns the commands of a category, sorted by name.
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = self
            .commands
            .values()
            .filter(|command| command.category == category)
            .cloned()
            .collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    /// Returns every category seen during registration, sorted.
    pub fn list_categories(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }

    /// Returns every command, sorted by name.
    pub fn list_all(&self) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = self.commands.values().cloned().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::actions::PingHandler;

    fn definition(name: &str) -> CommandDefinition {
        CommandDefinition::new(name, Arc::new(PingHandler))
    }

    #[test]
    fn test_get_by_name_and_alias_returns_same_command() {
        let mut store = CommandStore::new();
        store
            .register(definition("welcome").with_aliases(&["bienvenue", "hello"]))
            .unwrap();

        let by_name = store.get("welcome").unwrap();
        let by_alias = store.get("bienvenue").unwrap();
        let by_other_alias = store.get("hello").unwrap();

        assert!(Arc::ptr_eq(&by_name, &by_alias));
        assert!(Arc::ptr_eq(&by_name, &by_other_alias));
    }

    #[test]
    fn test_get_unknown_returns_none() {
        let mut store = CommandStore::new();
        store.register(definition("ping")).unwrap();

        assert!(store.get("pong").is_none());
        assert!(CommandStore::new().get("ping").is_none());
    }

    #[test]
    fn test_register_without_name_fails_without_mutation() {
        let mut store = CommandStore::new();
        let mut nameless = definition("ignored")
            .with_category("Group")
            .with_aliases(&["x"]);
        nameless.name = None;

        assert_eq!(
            store.register(nameless).unwrap_err(),
            RegistrationError::MissingName
        );
        assert!(store.is_empty());
        assert!(store.list_categories().is_empty());
        assert!(store.get("x").is_none());
    }

    #[test]
    fn test_register_with_blank_name_fails() {
        let mut store = CommandStore::new();

        let result = store.register(definition("   "));

        assert_eq!(result.unwrap_err(), RegistrationError::MissingName);
        assert!(store.is_empty());
    }

    #[test]
    fn test_register_defaults_category_to_misc() {
        let mut store = CommandStore::new();
        store.register(definition("ping")).unwrap();

        assert_eq!(store.get("ping").unwrap().category, DEFAULT_CATEGORY);
        assert_eq!(store.list_categories(), vec!["Misc".to_string()]);
    }

    #[test]
    fn test_register_same_name_overwrites() {
        let mut store = CommandStore::new();
        store
            .register(definition("ping").with_description("first"))
            .unwrap();
        store
            .register(definition("ping").with_description("second"))
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("ping").unwrap().description.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_alias_collision_last_registration_wins() {
        let mut store = CommandStore::new();
        store
            .register(definition("welcome").with_aliases(&["hi"]))
            .unwrap();
        store
            .register(definition("ping").with_aliases(&["hi"]))
            .unwrap();

        assert_eq!(store.get("hi").unwrap().name, "ping");
        assert_eq!(store.get("welcome").unwrap().name, "welcome");
    }

    #[test]
    fn test_name_takes_precedence_over_alias() {
        let mut store = CommandStore::new();
        store.register(definition("menu")).unwrap();
        store
            .register(definition("help").with_aliases(&["menu"]))
            .unwrap();

        assert_eq!(store.get("menu").unwrap().name, "menu");
    }

    #[test]
    fn test_register_lowercases_name_and_aliases() {
        let mut store = CommandStore::new();
        let command = store
            .register(definition(" Ping ").with_aliases(&["Alive", "  "]))
            .unwrap();

        assert_eq!(command.name, "ping");
        assert_eq!(command.aliases, vec!["alive"]);
        assert!(Arc::ptr_eq(&store.get("ping").unwrap(), &command));
        assert!(Arc::ptr_eq(&store.get("PING").unwrap(), &command));
        assert!(Arc::ptr_eq(&store.get("alive").unwrap(), &command));
        assert!(Arc::ptr_eq(&store.get("ALIVE").unwrap(), &command));
    }

    #[test]
    fn test_list_by_category_returns_only_matching_commands() {
        let mut store = CommandStore::new();
        store
            .register(definition("welcome").with_category("Group"))
            .unwrap();
        store
            .register(definition("goodbye").with_category("Group"))
            .unwrap();
        store
            .register(definition("ping").with_category("General"))
            .unwrap();
        store.register(definition("misc")).unwrap();

        let names: Vec<String> = store
            .list_by_category("Group")
            .iter()
            .map(|command| command.name.clone())
            .collect();

        assert_eq!(names, vec!["goodbye", "welcome"]);
        assert!(store.list_by_category("Unknown").is_empty());
    }

    #[test]
    fn test_list_categories_and_all_are_sorted_snapshots() {
        let mut store = CommandStore::new();
        store
            .register(definition("welcome").with_category("Group"))
            .unwrap();
        store
            .register(definition("ping").with_category("General"))
            .unwrap();

        let categories = store.list_categories();
        let all = store.list_all();
        store
            .register(definition("alive").with_category("Zzz"))
            .unwrap();

        assert_eq!(categories, vec!["General", "Group"]);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "ping");
        assert_eq!(all[1].name, "welcome");
        assert_eq!(store.len(), 3);
        assert_eq!(store.category_count(), 3);
    }
}
