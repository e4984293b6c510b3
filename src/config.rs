//! Configuration file structures for the Goodchild bot tooling.
//!
//! The configuration is read from a YAML file and can be overridden by
//! environment variables prefixed with `GOODCHILD_`, nested keys being
//! separated by `__` (e.g. `GOODCHILD_DATABASE__URL`).
//!
//! # Configuration File Format
//!
//! ```yaml
//! database:
//!   # Required, there is no built-in fallback
//!   url: "sqlite://data/events.db"
//!   pool_size: 8
//!
//! commands:
//!   # Directory scanned recursively for command manifests
//!   dir: "commands"
//!   prefix: "!"
//!
//! security:
//!   main_file: "src/main.rs"
//!   web_server_files: ["src/server.rs"]
//! ```

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

/// Prefix of the environment variables overriding the configuration file.
const ENV_PREFIX: &str = "GOODCHILD_";

/// Root configuration structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Event flag database settings
    pub database: Database,
    /// Command registry settings
    #[serde(default)]
    pub commands: Commands,
}

/// Event flag database settings.
#[derive(Debug, Deserialize)]
pub struct Database {
    /// Connection string: `sqlite://<path>`, `sqlite:<path>` or a plain path.
    ///
    /// Required. A missing or empty value is a startup error.
    pub url: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Command registry settings.
#[derive(Debug, Deserialize)]
pub struct Commands {
    /// Directory scanned recursively for command manifests.
    #[serde(default = "default_commands_dir")]
    pub dir: String,

    /// Character starting a command in a chat message.
    #[serde(default = "default_prefix")]
    pub prefix: char,
}

impl Default for Commands {
    fn default() -> Self {
        Commands {
            dir: default_commands_dir(),
            prefix: default_prefix(),
        }
    }
}

/// Settings of the `security-check` subcommand.
///
/// Read on its own with [`Security::load`] so the check runs without a
/// database section.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Security {
    /// Entry point of the bot, checked for session handling.
    #[serde(default = "default_main_file")]
    pub main_file: String,

    /// Files serving HTTP, checked for security headers.
    #[serde(default = "default_web_server_files")]
    pub web_server_files: Vec<String>,

    /// Every marker must appear in the main file for session expiry and
    /// closed connections to count as handled.
    #[serde(default = "default_session_markers")]
    pub session_markers: Vec<String>,

    /// At least one marker must appear in the main file for session
    /// cleanup to count as implemented.
    #[serde(default = "default_cleanup_markers")]
    pub cleanup_markers: Vec<String>,
}

impl Default for Security {
    fn default() -> Self {
        Security {
            main_file: default_main_file(),
            web_server_files: default_web_server_files(),
            session_markers: default_session_markers(),
            cleanup_markers: default_cleanup_markers(),
        }
    }
}

impl Config {
    /// Loads the configuration from a YAML file merged with `GOODCHILD_`
    /// environment variables, then validates it.
    ///
    /// A missing file is not an error as long as the environment provides
    /// every required value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, a required value is
    /// missing or a value is invalid.
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let config: Config = figment(path)
            .extract()
            .with_context(|| format!("invalid configuration in {}", path))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        if self.database.pool_size == 0 {
            bail!("database.pool_size must be greater than 0");
        }
        if self.commands.prefix.is_whitespace() {
            bail!("commands.prefix must not be a whitespace character");
        }
        Ok(())
    }
}

impl Security {
    /// Loads only the `security` section, falling back to defaults.
    ///
    /// The checks run before deployment, when the database settings may not
    /// exist yet, so the rest of the configuration is not required.
    pub fn load(path: &str) -> anyhow::Result<Security> {
        let figment = figment(path);
        if !figment.contains("security") {
            return Ok(Security::default());
        }

        figment
            .extract_inner("security")
            .with_context(|| format!("invalid security section in {}", path))
    }
}

fn figment(path: &str) -> Figment {
    Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

fn default_pool_size() -> u32 {
    8
}

fn default_commands_dir() -> String {
    "commands".to_owned()
}

fn default_prefix() -> char {
    '!'
}

fn default_main_file() -> String {
    "src/main.rs".to_owned()
}

fn default_web_server_files() -> Vec<String> {
    vec!["src/server.rs".to_owned()]
}

fn default_session_markers() -> Vec<String> {
    vec!["SessionExpired".to_owned(), "ConnectionClosed".to_owned()]
}

fn default_cleanup_markers() -> Vec<String> {
    vec!["remove_dir_all".to_owned(), "remove_file".to_owned()]
}
