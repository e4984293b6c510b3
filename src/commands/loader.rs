//! Command manifest loading.
//!
//! This module provides the [`CommandLoader`], which walks a directory tree of
//! YAML command manifests and registers each of them into a [`CommandStore`].
//!
//! # Manifest format
//!
//! ```yaml
//! name: welcome
//! category: Group
//! aliases: [bienvenue]
//! description: Greet members joining the group
//! usage: "welcome on|off"
//! handler: welcome # optional, defaults to `name`
//! ```
//!
//! Loading is best-effort: a broken manifest is logged and skipped, it never
//! prevents its siblings from loading and never aborts startup.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Format, Yaml},
};
use log::{debug, error, info};
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::commands::{CommandDefinition, CommandStore, HandlerCatalog, RegistrationError};

/// File extensions recognized as command manifests.
const MANIFEST_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// On-disk description of a command.
///
/// Every field is optional at parse time: a manifest without `name` is not a
/// command and is skipped.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CommandManifest {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
    /// Identifier of the compiled-in handler, defaults to `name`
    pub handler: Option<String>,
}

/// Failure while loading one manifest or reading one directory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: Box<figment::Error>,
    },
    #[error("unknown handler `{handler}` in {path}")]
    UnknownHandler { path: PathBuf, handler: String },
    #[error("unable to register {path}: {source}")]
    Register {
        path: PathBuf,
        source: RegistrationError,
    },
}

/// Summary of a loading pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of the registered commands, in registration order
    pub registered: Vec<String>,
    /// Manifests without a command name
    pub skipped: Vec<PathBuf>,
    /// Manifests and directories that could not be loaded
    pub failures: Vec<LoadError>,
}

/// Loads command manifests from the file system into a [`CommandStore`].
///
/// Entries of a directory are visited in path order, so when two manifests
/// declare the same name the one sorting last is kept.
pub struct CommandLoader {
    /// Compiled-in handlers manifests can bind to
    catalog: HandlerCatalog,
    /// Directory used by [`CommandLoader::initialize`]
    commands_dir: PathBuf,
}

impl CommandLoader {
    pub fn new(catalog: HandlerCatalog, commands_dir: impl Into<PathBuf>) -> Self {
        CommandLoader {
            catalog,
            commands_dir: commands_dir.into(),
        }
    }

    /// Loads the configured commands directory and logs a summary.
    pub async fn initialize(&self, store: &mut CommandStore) -> LoadReport {
        let report = self.load_from_directory(store, &self.commands_dir).await;

        info!(
            "loaded {} commands in {} categories ({} failures)",
            store.len(),
            store.category_count(),
            report.failures.len()
        );

        report
    }

    /// Recursively loads every manifest below `path`.
    ///
    /// Failures are logged and collected in the returned [`LoadReport`]; they
    /// are never propagated. An unreadable directory only skips its own
    /// subtree. Each directory is visited once, even when symlinks lead back
    /// to it.
    pub async fn load_from_directory(&self, store: &mut CommandStore, path: &Path) -> LoadReport {
        let mut report = LoadReport::default();
        let mut pending = vec![path.to_path_buf()];
        let mut visited = HashSet::new();

        while let Some(dir) = pending.pop() {
            if let Ok(canonical) = fs::canonicalize(&dir).await {
                if !visited.insert(canonical) {
                    debug!("{} already visited, skipping", dir.display());
                    continue;
                }
            }

            let entries = match read_sorted_entries(&dir).await {
                Ok(entries) => entries,
                Err(source) => {
                    let err = LoadError::ReadDir { path: dir, source };
                    error!("{}", err);
                    report.failures.push(err);
                    continue;
                }
            };

            // Pushed in reverse so the work-list pops them in path order
            let mut subdirs = vec![];
            for entry in entries {
                match fs::metadata(&entry).await {
                    Ok(metadata) if metadata.is_dir() => subdirs.push(entry),
                    Ok(_) if is_manifest(&entry) => {
                        self.load_file(store, &entry, &mut report).await
                    }
                    Ok(_) => debug!("ignoring {}", entry.display()),
                    Err(source) => {
                        let err = LoadError::ReadFile {
                            path: entry,
                            source,
                        };
                        error!("{}", err);
                        report.failures.push(err);
                    }
                }
            }
            pending.extend(subdirs.into_iter().rev());
        }

        report
    }

    async fn load_file(&self, store: &mut CommandStore, path: &Path, report: &mut LoadReport) {
        match self.register_manifest(store, path).await {
            Ok(Some(name)) => report.registered.push(name),
            Ok(None) => {
                debug!("{} does not declare a command name, skipping", path.display());
                report.skipped.push(path.to_path_buf());
            }
            Err(err) => {
                error!("error loading command: {}", err);
                if matches!(err, LoadError::UnknownHandler { .. }) {
                    debug!("available handlers: {}", self.catalog.ids().join(", "));
                }
                report.failures.push(err);
            }
        }
    }

    /// Parses one manifest and registers it.
    ///
    /// Returns the registered name, or `None` when the manifest has no name.
    async fn register_manifest(
        &self,
        store: &mut CommandStore,
        path: &Path,
    ) -> Result<Option<String>, LoadError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;

        let manifest = parse_manifest(&content).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        let Some(name) = manifest.name.clone() else {
            return Ok(None);
        };

        let default_id = name.trim().to_lowercase();
        let handler_id = manifest.handler.as_deref().unwrap_or(&default_id);
        let handler = self
            .catalog
            .get(handler_id)
            .ok_or_else(|| LoadError::UnknownHandler {
                path: path.to_path_buf(),
                handler: handler_id.to_owned(),
            })?;

        let definition = CommandDefinition {
            name: Some(name),
            category: manifest.category,
            aliases: manifest.aliases,
            description: manifest.description,
            usage: manifest.usage,
            handler,
        };

        let command = store
            .register(definition)
            .map_err(|source| LoadError::Register {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Some(command.name.clone()))
    }
}

/// Parses a YAML command manifest.
pub fn parse_manifest(content: &str) -> Result<CommandManifest, figment::Error> {
    Figment::from(Yaml::string(content)).extract()
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| MANIFEST_EXTENSIONS.contains(&extension))
}

async fn read_sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut entries = vec![];
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
