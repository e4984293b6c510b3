//! Goodchild - command registry, group event flags and deployment tooling
//! for a chat bot.
//!
//! This is the main entry point of the Goodchild tooling. It exposes the
//! bot's command registry and its per-chat event flags from the command line,
//! together with the checks run before a deployment.
//!
//! # Overview
//!
//! Bot commands are described by YAML manifests stored under a commands
//! directory and bound to handlers compiled into the binary. Group event
//! notifications (welcome, goodbye, promote, demote) are toggled per chat and
//! stored in an SQLite database.
//!
//! # Features
//!
//! - **Command Registry**: Commands with categories and aliases, loaded from a directory tree
//! - **Event Flags**: Per-chat welcome, goodbye, promote and demote toggles
//! - **Console Bot**: Chat with the bot from a terminal to try commands end to end
//! - **Deployment Check**: Required files and variables for each hosting platform
//! - **Security Check**: Source scan, `.env` review, dependency audit, headers and session handling
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! database:
//!   url: "sqlite://data/events.db"
//!
//! commands:
//!   dir: "commands"
//!   prefix: "!"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Override any configuration value using environment variables with the `GOODCHILD_` prefix:
//!
//! ```bash
//! export GOODCHILD_DATABASE__URL="sqlite:///var/lib/goodchild/events.db"
//! export GOODCHILD_COMMANDS__PREFIX="."
//! ```
//!
//! # Usage
//!
//! ```bash
//! goodchild shell --jid 123@g.us
//! goodchild dispatch "!welcome on" --jid 123@g.us
//! goodchild commands --category Group
//! goodchild flag set 123@g.us welcome oui
//! goodchild flag get 123@g.us welcome
//! goodchild deploy-check
//! goodchild security-check --skip-audit
//! ```
//!
//! # Architecture
//!
//! - [`bot`] - Facade turning chat messages into responses, console transport
//! - [`checks`] - Deployment and security checks
//! - [`commands`] - Command store, manifest loader, dispatcher and built-in handlers
//! - [`config`] - YAML configuration with environment variable support
//! - [`events`] - Per-chat event flags and their SQLite store
//! - [`utils`] - Text and path helpers
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)
//!   - Set to `debug` for verbose output
//!   - Set to `warn` or `error` for minimal logging

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use tokio::io::BufReader;

use crate::{
    bot::{Bot, IncomingMessage},
    config::{Config, Security},
    events::EventFlagStore,
};

mod bot;
mod checks;
mod commands;
mod config;
mod events;
mod utils;

/// Command-line arguments for the Goodchild tooling.
///
/// # Examples
///
/// ```bash
/// goodchild --config config.yaml shell
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    ///
    /// Values can be overridden with `GOODCHILD_` environment variables, see
    /// the [`config`] module for the expected format.
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Chat with the bot from the terminal, one message per line
    Shell {
        /// Chat the messages are sent in
        #[arg(long, default_value = "console@g.us")]
        jid: String,
        /// Author of the messages
        #[arg(long, default_value = "console")]
        sender: String,
    },

    /// Handle a single message and print the response
    Dispatch {
        /// Message body, e.g. "!welcome on"
        message: String,
        #[arg(long, default_value = "console@g.us")]
        jid: String,
        #[arg(long, default_value = "console")]
        sender: String,
    },

    /// List the loaded commands
    Commands {
        /// Only list the commands of this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Read or write an event flag
    Flag {
        #[command(subcommand)]
        action: FlagAction,
    },

    /// Check that the project is ready to be deployed
    DeployCheck {
        /// Project directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Look for potential security issues in the project
    SecurityCheck {
        /// Project directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Do not run `cargo audit`
        #[arg(long)]
        skip_audit: bool,
    },
}

#[derive(Subcommand, Debug)]
enum FlagAction {
    /// Print the stored value of a flag
    Get { jid: String, flag: String },
    /// Store a value for a flag, creating the chat row if needed
    Set {
        jid: String,
        flag: String,
        value: String,
    },
}

/// Main entry point for the Goodchild tooling.
///
/// Configures the logger with `info` level by default (can be overridden with
/// the `RUST_LOG` environment variable), parses the command line and runs
/// the requested subcommand.
///
/// # Exit Codes
///
/// - `0` - Success, including security checks that found issues
/// - `1` - Configuration or startup error, missing deployment files
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug goodchild --config config.yaml shell
/// ```
#[tokio::main]
async fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    // Parse command line arguments
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Action::Shell { jid, sender } => {
            let bot = start_bot(&args.config).await?;
            bot.run_console(
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                &jid,
                &sender,
            )
            .await?;
            Ok(ExitCode::SUCCESS)
        }
        Action::Dispatch {
            message,
            jid,
            sender,
        } => {
            let bot = start_bot(&args.config).await?;
            let message = IncomingMessage {
                body: message,
                jid,
                sender_id: sender,
            };
            match bot.handle_message(&message).await {
                Some(response) => println!("{}", response),
                None => info!("not a command, no response"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Action::Commands { category } => {
            let bot = start_bot(&args.config).await?;
            print_commands(bot.commands(), category.as_deref());
            Ok(ExitCode::SUCCESS)
        }
        Action::Flag { action } => {
            let config = load_config(&args.config)?;
            let store = EventFlagStore::open(&config.database)?;
            store.initialize_schema().await?;
            match action {
                FlagAction::Get { jid, flag } => match store.get_flag(&jid, &flag).await? {
                    Some(value) => println!("{}", value),
                    None => println!("(not set)"),
                },
                FlagAction::Set { jid, flag, value } => {
                    if !store.set_flag(&jid, &flag, &value).await? {
                        anyhow::bail!("unable to store {} for {}", flag, jid);
                    }
                    println!("{} = {} for {}", flag, value, jid);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Action::DeployCheck { root } => {
            let report = checks::check_deployment(&root, |var| std::env::var(var).ok()).await;
            print!("{}", report.render());
            Ok(ExitCode::from(report.exit_code()))
        }
        Action::SecurityCheck { root, skip_audit } => {
            let security = Security::load(&args.config)?;
            let report = checks::check_security(&root, &security, skip_audit)
                .await
                .with_context(|| format!("unable to scan {}", root.display()))?;
            print!("{}", report.render());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    Config::load(path).context("failed to load config file")
}

async fn start_bot(config_path: &str) -> anyhow::Result<Bot> {
    info!("Starting goodchild {}...", env!("CARGO_PKG_VERSION"));
    let config = load_config(config_path)?;
    Bot::new(&config).await.context("failed to initialize bot")
}

fn print_commands(store: &commands::CommandStore, category: Option<&str>) {
    let commands = match category {
        Some(category) => store.list_by_category(category),
        None => store.list_all(),
    };

    for command in commands {
        let aliases = if command.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", command.aliases.join(", "))
        };
        println!(
            "{:<12} {:<10} {}{}",
            command.name,
            command.category,
            command.description.as_deref().unwrap_or(""),
            aliases
        );
    }
}
