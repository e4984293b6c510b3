//! Bot module wiring the command registry and the event flag store.
//!
//! This module provides the [`Bot`] facade: it owns the loaded
//! [`CommandStore`], the per-chat flag storage and the [`Dispatcher`], and
//! turns incoming chat messages into responses.
//!
//! The messaging client itself is not part of this crate. A console
//! transport ([`Bot::run_console`]) feeds lines typed by an operator into the
//! bot as messages of a single chat, which is enough to exercise commands and
//! flags end to end.
//!
//! # Message Processing Flow
//!
//! ```text
//! IncomingMessage → Dispatcher::dispatch → Handler::invoke → response
//!                        │
//!                        └─ not a command → no response
//! ```
//!
//! # Example
//!
//! ```no_run
//! # use goodchild::bot::{Bot, IncomingMessage};
//! # use goodchild::config::Config;
//! # async fn run() -> Result<(), anyhow::Error> {
//! let config = Config::load("config.yaml")?;
//! let bot = Bot::new(&config).await?;
//!
//! let message = IncomingMessage {
//!     body: "!welcome on".to_string(),
//!     jid: "123@g.us".to_string(),
//!     sender_id: "33600000000@s.whatsapp.net".to_string(),
//! };
//! if let Some(response) = bot.handle_message(&message).await {
//!     println!("{}", response);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Context;
use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    commands::{CommandLoader, CommandStore, DispatchError, Dispatcher, HandlerCatalog},
    config::Config,
    events::{EventFlagStore, FlagStorage},
};

/// A chat message received by the bot.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// The message body text
    pub body: String,
    /// The chat or group where the message was sent
    pub jid: String,
    /// The author of the message
    pub sender_id: String,
}

/// Facade over the command registry and the event flag store.
///
/// Every component is behind an `Arc`, the command store is immutable once
/// loaded, so the bot can be shared between tasks without locking.
pub struct Bot {
    /// Commands loaded at startup.
    commands: Arc<CommandStore>,

    /// Per-chat event flags.
    flags: Arc<dyn FlagStorage>,

    /// Command parser and router.
    dispatcher: Arc<Dispatcher>,
}

impl Bot {
    /// Creates a bot from the configuration.
    ///
    /// Opens the event flag database, ensures its schema exists, then loads
    /// the command manifests. Broken manifests are logged and skipped, they
    /// never prevent startup.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The database URL is invalid or the database cannot be opened
    /// - The schema cannot be created
    pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let store = EventFlagStore::open(&config.database)
            .with_context(|| format!("unable to open database {}", config.database.url))?;
        store
            .initialize_schema()
            .await
            .context("unable to initialize the events table")?;

        let mut commands = CommandStore::new();
        let loader = CommandLoader::new(HandlerCatalog::builtin(), &config.commands.dir);
        loader.initialize(&mut commands).await;

        Ok(Bot::from_parts(
            commands,
            Arc::new(store),
            config.commands.prefix,
        ))
    }

    /// Creates a bot from already built components.
    pub fn from_parts(commands: CommandStore, flags: Arc<dyn FlagStorage>, prefix: char) -> Self {
        Bot {
            commands: Arc::new(commands),
            flags,
            dispatcher: Arc::new(Dispatcher::new(prefix)),
        }
    }

    pub fn commands(&self) -> &CommandStore {
        &self.commands
    }

    /// Handles one incoming message.
    ///
    /// # Returns
    ///
    /// * `Some(response)` - Message to send back to the chat
    /// * `None` - The message is not a command, nothing must be sent
    pub async fn handle_message(&self, message: &IncomingMessage) -> Option<String> {
        let result = self
            .dispatcher
            .dispatch(
                &self.commands,
                self.flags.as_ref(),
                &message.jid,
                &message.sender_id,
                &message.body,
            )
            .await;

        match result {
            Ok(result) => Some(result.response),
            // Return silently if the message is not for the bot
            Err(DispatchError::NotForBot) => None,
        }
    }

    /// Runs a console transport until `reader` is exhausted.
    ///
    /// Every line read is handled as a message sent by `sender_id` in chat
    /// `jid`, responses are written to `writer` followed by an empty line.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub async fn run_console<R, W>(
        &self,
        reader: R,
        mut writer: W,
        jid: &str,
        sender_id: &str,
    ) -> Result<(), anyhow::Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("console ready, messages are sent to {} as {}", jid, sender_id);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let message = IncomingMessage {
                body: line,
                jid: jid.to_owned(),
                sender_id: sender_id.to_owned(),
            };

            let Some(response) = self.handle_message(&message).await else {
                debug!("ignoring message {:?}", message.body);
                continue;
            };

            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n\n").await?;
            writer.flush().await?;
        }

        info!("console input closed");
        Ok(())
    }
}
