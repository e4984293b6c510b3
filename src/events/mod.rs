//! Per-chat event flags.
//!
//! Each chat (identified by its JID) has a small fixed set of toggles
//! controlling group event notifications: welcome and goodbye messages,
//! promote and demote announcements.
//!
//! Flags are stored as free text to stay compatible with existing data
//! (`"oui"` / `"non"`). Code that only cares about on/off reads them through
//! [`FlagState`].
//!
//! # Components
//!
//! - [`FlagColumn`]: the allow-list of flag names
//! - [`FlagStorage`]: storage seam used by the command handlers
//! - [`EventFlagStore`]: SQLite implementation backed by a connection pool

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

mod store;

pub use crate::events::store::EventFlagStore;

/// Stored value meaning "enabled".
pub const ENABLED_VALUE: &str = "oui";
/// Stored value meaning "disabled", also the column default.
pub const DISABLED_VALUE: &str = "non";

/// A flag column of the `events` table.
///
/// This enum is the allow-list: a flag name that does not parse into a
/// `FlagColumn` never reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagColumn {
    Welcome,
    Goodbye,
    Promote,
    Demote,
}

impl FlagColumn {
    pub const ALL: [FlagColumn; 4] = [
        FlagColumn::Welcome,
        FlagColumn::Goodbye,
        FlagColumn::Promote,
        FlagColumn::Demote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FlagColumn::Welcome => "welcome",
            FlagColumn::Goodbye => "goodbye",
            FlagColumn::Promote => "promote",
            FlagColumn::Demote => "demote",
        }
    }
}

impl fmt::Display for FlagColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagColumn {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlagColumn::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| FlagError::InvalidColumn(s.to_owned()))
    }
}

/// Typed view over a stored flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    Enabled,
    Disabled,
    /// The chat has no row yet
    Unset,
}

impl FlagState {
    /// Interprets a stored value. Anything other than the enabled value is
    /// considered disabled.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            None => FlagState::Unset,
            Some(value) if value.eq_ignore_ascii_case(ENABLED_VALUE) => FlagState::Enabled,
            Some(_) => FlagState::Disabled,
        }
    }
}

/// Errors of the event flag store.
#[derive(Debug, Error)]
pub enum FlagError {
    /// The flag name is not part of the allow-list.
    #[error("invalid column name: {0}")]
    InvalidColumn(String),
    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
    #[error("unable to create the database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage of per-chat flags.
///
/// Implementations report storage failures as `false` / `None` after logging
/// them, so callers cannot distinguish "no data" from "storage failure".
#[automock]
#[async_trait]
pub trait FlagStorage: Send + Sync {
    /// Writes a flag, creating the chat row if needed. Returns `false` if the
    /// write failed.
    async fn write_flag(&self, jid: &str, column: FlagColumn, value: &str) -> bool;

    /// Reads a flag, `None` if the chat has no row or the read failed.
    async fn read_flag(&self, jid: &str, column: FlagColumn) -> Option<String>;
}

/// Reads a flag as a [`FlagState`].
pub async fn flag_state(storage: &dyn FlagStorage, jid: &str, column: FlagColumn) -> FlagState {
    let value = storage.read_flag(jid, column).await;
    FlagState::from_stored(value.as_deref())
}

/// Turns a flag on or off using the legacy stored values.
pub async fn set_enabled(
    storage: &dyn FlagStorage,
    jid: &str,
    column: FlagColumn,
    enabled: bool,
) -> bool {
    let value = if enabled { ENABLED_VALUE } else { DISABLED_VALUE };
    storage.write_flag(jid, column, value).await
}

/// Reads every flag of a chat.
pub async fn get_flags(storage: &dyn FlagStorage, jid: &str) -> Vec<(FlagColumn, FlagState)> {
    let mut flags = Vec::with_capacity(FlagColumn::ALL.len());
    for column in FlagColumn::ALL {
        flags.push((column, flag_state(storage, jid, column).await));
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_flag_column_from_str() {
        assert_eq!("welcome".parse::<FlagColumn>().unwrap(), FlagColumn::Welcome);
        assert_eq!("demote".parse::<FlagColumn>().unwrap(), FlagColumn::Demote);
    }

    #[test]
    fn test_flag_column_rejects_unknown_names() {
        for name in ["not_a_real_column", "Welcome", "jid", "welcome; DROP TABLE events", ""] {
            let err = name.parse::<FlagColumn>().unwrap_err();
            assert!(matches!(err, FlagError::InvalidColumn(ref n) if n == name));
        }
    }

    #[test]
    fn test_flag_state_from_stored() {
        assert_eq!(FlagState::from_stored(None), FlagState::Unset);
        assert_eq!(FlagState::from_stored(Some("oui")), FlagState::Enabled);
        assert_eq!(FlagState::from_stored(Some("OUI")), FlagState::Enabled);
        assert_eq!(FlagState::from_stored(Some("non")), FlagState::Disabled);
        assert_eq!(FlagState::from_stored(Some("maybe")), FlagState::Disabled);
    }

    #[tokio::test]
    async fn test_set_enabled_writes_legacy_values() {
        let mut storage = MockFlagStorage::new();
        storage
            .expect_write_flag()
            .with(eq("123@g.us"), eq(FlagColumn::Welcome), eq("oui"))
            .times(1)
            .returning(|_, _, _| true);
        storage
            .expect_write_flag()
            .with(eq("123@g.us"), eq(FlagColumn::Goodbye), eq("non"))
            .times(1)
            .returning(|_, _, _| false);

        assert!(set_enabled(&storage, "123@g.us", FlagColumn::Welcome, true).await);
        assert!(!set_enabled(&storage, "123@g.us", FlagColumn::Goodbye, false).await);
    }

    #[tokio::test]
    async fn test_get_flags_reads_every_column() {
        let mut storage = MockFlagStorage::new();
        storage
            .expect_read_flag()
            .times(4)
            .returning(|_, column| match column {
                FlagColumn::Welcome => Some("oui".to_string()),
                FlagColumn::Goodbye => Some("non".to_string()),
                _ => None,
            });

        let flags = get_flags(&storage, "123@g.us").await;

        assert_eq!(
            flags,
            vec![
                (FlagColumn::Welcome, FlagState::Enabled),
                (FlagColumn::Goodbye, FlagState::Disabled),
                (FlagColumn::Promote, FlagState::Unset),
                (FlagColumn::Demote, FlagState::Unset),
            ]
        );
    }
}
