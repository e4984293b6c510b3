//! SQLite backed event flag store.

use std::path::Path;

use async_trait::async_trait;
use log::{debug, error, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    config::Database,
    events::{FlagColumn, FlagError, FlagStorage},
};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    jid TEXT UNIQUE NOT NULL,
    welcome TEXT NOT NULL DEFAULT 'non',
    goodbye TEXT NOT NULL DEFAULT 'non',
    promote TEXT NOT NULL DEFAULT 'non',
    demote TEXT NOT NULL DEFAULT 'non'
)";

/// Per-chat event flags stored in the `events` table.
///
/// Every operation borrows one pooled connection on the blocking thread pool
/// and returns it when done, error or not.
///
/// Writes are a single `INSERT ... ON CONFLICT(jid) DO UPDATE` statement, so
/// two concurrent writers for a chat that has no row yet end up with exactly
/// one row holding one of the two values.
///
/// # Examples
///
/// ```no_run
/// # use goodchild::events::EventFlagStore;
/// # async fn example() -> Result<(), goodchild::events::FlagError> {
/// let store = EventFlagStore::open_path("data/events.db", 4)?;
/// store.initialize_schema().await?;
///
/// store.set_flag("123@g.us", "welcome", "oui").await?;
/// assert_eq!(store.get_flag("123@g.us", "welcome").await?, Some("oui".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventFlagStore {
    pool: Pool<SqliteConnectionManager>,
}

impl EventFlagStore {
    /// Opens the store described by the database configuration.
    ///
    /// The url is either `sqlite://<path>`, `sqlite:<path>` or a plain path.
    pub fn open(database: &Database) -> Result<Self, FlagError> {
        let path = database_path(&database.url)?;
        Self::open_path(path, database.pool_size)
    }

    /// Opens (and creates if needed) the SQLite database at `path`.
    pub fn open_path(path: impl AsRef<Path>, pool_size: u32) -> Result<Self, FlagError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA busy_timeout=5000; PRAGMA journal_mode=WAL;")
        });
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        info!("opened event flag store {}", path.display());

        Ok(EventFlagStore { pool })
    }

    /// Creates the `events` table if it does not exist yet.
    pub async fn initialize_schema(&self) -> Result<(), FlagError> {
        self.with_connection(|conn| conn.execute_batch(CREATE_TABLE))
            .await?;
        info!("events table is ready");
        Ok(())
    }

    /// Sets `flag` to `value` for `jid`, creating the row if needed.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The value was written
    /// * `Ok(false)` - The database failed, the error has been logged
    ///
    /// # Errors
    ///
    /// [`FlagError::InvalidColumn`] if `flag` is not a known flag. Nothing is
    /// written in that case.
    pub async fn set_flag(&self, jid: &str, flag: &str, value: &str) -> Result<bool, FlagError> {
        let column: FlagColumn = flag.parse()?;
        Ok(self.write_flag(jid, column, value).await)
    }

    /// Returns the value of `flag` for `jid`.
    ///
    /// `Ok(None)` when the chat has no row, and also when the database
    /// failed (the error is logged).
    ///
    /// # Errors
    ///
    /// [`FlagError::InvalidColumn`] if `flag` is not a known flag.
    pub async fn get_flag(&self, jid: &str, flag: &str) -> Result<Option<String>, FlagError> {
        let column: FlagColumn = flag.parse()?;
        Ok(self.read_flag(jid, column).await)
    }

    async fn upsert(&self, jid: &str, column: FlagColumn, value: &str) -> Result<(), FlagError> {
        let jid = jid.to_owned();
        let value = value.to_owned();
        self.with_connection(move |conn| {
            conn.execute(upsert_statement(column), params![jid, value])
                .map(|_| ())
        })
        .await
    }

    async fn select(&self, jid: &str, column: FlagColumn) -> Result<Option<String>, FlagError> {
        let jid = jid.to_owned();
        self.with_connection(move |conn| {
            conn.query_row(select_statement(column), params![jid], |row| row.get(0))
                .optional()
        })
        .await
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, FlagError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, FlagError> {
            let conn = pool.get()?;
            Ok(f(&conn)?)
        })
        .await?
    }
}

#[async_trait]
impl FlagStorage for EventFlagStore {
    async fn write_flag(&self, jid: &str, column: FlagColumn, value: &str) -> bool {
        match self.upsert(jid, column, value).await {
            Ok(()) => {
                debug!("updated {} of {} to {}", column, jid, value);
                true
            }
            Err(e) => {
                error!("failed to update {} of {}: {}", column, jid, e);
                false
            }
        }
    }

    async fn read_flag(&self, jid: &str, column: FlagColumn) -> Option<String> {
        match self.select(jid, column).await {
            Ok(value) => value,
            Err(e) => {
                error!("failed to read {} of {}: {}", column, jid, e);
                None
            }
        }
    }
}

/// Statements are spelled out per column so that no SQL text is ever built
/// at runtime.
fn upsert_statement(column: FlagColumn) -> &'static str {
    match column {
        FlagColumn::Welcome => {
            "INSERT INTO events (jid, welcome) VALUES (?1, ?2) \
             ON CONFLICT(jid) DO UPDATE SET welcome = excluded.welcome"
        }
        FlagColumn::Goodbye => {
            "INSERT INTO events (jid, goodbye) VALUES (?1, ?2) \
             ON CONFLICT(jid) DO UPDATE SET goodbye = excluded.goodbye"
        }
        FlagColumn::Promote => {
            "INSERT INTO events (jid, promote) VALUES (?1, ?2) \
             ON CONFLICT(jid) DO UPDATE SET promote = excluded.promote"
        }
        FlagColumn::Demote => {
            "INSERT INTO events (jid, demote) VALUES (?1, ?2) \
             ON CONFLICT(jid) DO UPDATE SET demote = excluded.demote"
        }
    }
}

fn select_statement(column: FlagColumn) -> &'static str {
    match column {
        FlagColumn::Welcome => "SELECT welcome FROM events WHERE jid = ?1",
        FlagColumn::Goodbye => "SELECT goodbye FROM events WHERE jid = ?1",
        FlagColumn::Promote => "SELECT promote FROM events WHERE jid = ?1",
        FlagColumn::Demote => "SELECT demote FROM events WHERE jid = ?1",
    }
}

fn database_path(url: &str) -> Result<&str, FlagError> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
        .trim();

    if path.is_empty() {
        return Err(FlagError::InvalidUrl(url.to_owned()));
    }
    if url.contains("://") && !url.starts_with("sqlite://") {
        return Err(FlagError::InvalidUrl(format!(
            "{}: only sqlite databases are supported",
            url
        )));
    }

    Ok(path)
}
