//! SQLite-backed session store.
//!
//! Provides persistent storage for:
//! - One session document per owner, versioned for compare-and-swap
//! - Per-card completed-session counters

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations, SessionStore};
use crate::counter::CardCounter;
use crate::error::StoreError;
use crate::session::{CardId, OwnerId, SessionState, Versioned};

/// SQLite database holding session documents and card counters.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `~/.config/cardpomo/cardpomo.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Self::open_at(dir.join("cardpomo.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "opened session store");
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(2))?;
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn decode(owner: &OwnerId, version: u64, document: &str) -> Result<Versioned<SessionState>, StoreError> {
        let value = serde_json::from_str(document).map_err(|e| StoreError::Corrupt {
            owner: owner.to_string(),
            message: e.to_string(),
        })?;
        Ok(Versioned { version, value })
    }

    fn encode(state: &SessionState) -> Result<String, StoreError> {
        serde_json::to_string(state).map_err(|e| StoreError::Corrupt {
            owner: state.owner.to_string(),
            message: e.to_string(),
        })
    }
}

impl SessionStore for SqliteStore {
    fn read_session(&self, owner: &OwnerId) -> Result<Option<Versioned<SessionState>>, StoreError> {
        let conn = self.conn.lock()?;
        let row = conn
            .query_row(
                "SELECT version, document FROM sessions WHERE owner = ?1",
                params![owner.as_str()],
                |row| Ok((row.get::<_, u64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        row.map(|(version, document)| Self::decode(owner, version, &document))
            .transpose()
    }

    fn create_session(&self, state: &SessionState) -> Result<Versioned<SessionState>, StoreError> {
        let document = Self::encode(state)?;
        {
            let conn = self.conn.lock()?;
            conn.execute(
                "INSERT OR IGNORE INTO sessions (owner, version, document, updated_at)
                 VALUES (?1, 1, ?2, ?3)",
                params![state.owner.as_str(), document, Utc::now().to_rfc3339()],
            )?;
        }
        self.read_session(&state.owner)?
            .ok_or_else(|| StoreError::QueryFailed(format!("session for '{}' vanished", state.owner)))
    }

    fn write_session(
        &self,
        owner: &OwnerId,
        expected_version: u64,
        state: &SessionState,
    ) -> Result<bool, StoreError> {
        let document = Self::encode(state)?;
        let conn = self.conn.lock()?;
        let changed = conn.execute(
            "UPDATE sessions
             SET version = version + 1, document = ?3, updated_at = ?4
             WHERE owner = ?1 AND version = ?2",
            params![owner.as_str(), expected_version, document, Utc::now().to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    fn read_counter(&self, card_id: &CardId) -> Result<Option<CardCounter>, StoreError> {
        let conn = self.conn.lock()?;
        let counter = conn
            .query_row(
                "SELECT owner, count FROM card_sessions WHERE card_id = ?1",
                params![card_id.as_str()],
                |row| {
                    Ok(CardCounter {
                        card_id: card_id.clone(),
                        owner: OwnerId::new(row.get::<_, String>(0)?),
                        completed_count: row.get::<_, u64>(1)?,
                    })
                },
            )
            .optional()?;
        Ok(counter)
    }

    fn increment_counter(&self, card_id: &CardId, owner: &OwnerId) -> Result<CardCounter, StoreError> {
        let conn = self.conn.lock()?;
        let counter = conn.query_row(
            "INSERT INTO card_sessions (card_id, owner, count, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(card_id) DO UPDATE SET
                count = count + 1,
                updated_at = excluded.updated_at
             RETURNING owner, count",
            params![card_id.as_str(), owner.as_str(), Utc::now().to_rfc3339()],
            |row| {
                Ok(CardCounter {
                    card_id: card_id.clone(),
                    owner: OwnerId::new(row.get::<_, String>(0)?),
                    completed_count: row.get::<_, u64>(1)?,
                })
            },
        )?;
        Ok(counter)
    }
}
