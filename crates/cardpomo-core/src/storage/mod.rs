mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{Config, DayBoundaryConfig, IdentityConfig, SchedulerConfig, TimerConfig};
pub use database::SqliteStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::counter::CardCounter;
use crate::error::StoreError;
use crate::session::{CardId, OwnerId, SessionState, Versioned};

/// Persistence contract for session documents and card counters.
///
/// Session writes are compare-and-swap on the document version so that a
/// transition computed from a stale snapshot is never applied.
pub trait SessionStore: Send + Sync {
    /// Read the owner's session, if one was ever created.
    fn read_session(&self, owner: &OwnerId) -> Result<Option<Versioned<SessionState>>, StoreError>;

    /// Insert `state` unless a session for its owner already exists.
    /// Returns whatever document is stored afterwards.
    fn create_session(&self, state: &SessionState) -> Result<Versioned<SessionState>, StoreError>;

    /// Replace the owner's session if it is still at `expected_version`.
    /// Returns `false` when another writer got there first.
    fn write_session(
        &self,
        owner: &OwnerId,
        expected_version: u64,
        state: &SessionState,
    ) -> Result<bool, StoreError>;

    fn read_counter(&self, card_id: &CardId) -> Result<Option<CardCounter>, StoreError>;

    /// Atomically create-if-absent and add one.
    fn increment_counter(&self, card_id: &CardId, owner: &OwnerId) -> Result<CardCounter, StoreError>;
}

/// Returns `~/.config/cardpomo[-dev]/` based on CARDPOMO_ENV.
///
/// Set CARDPOMO_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CARDPOMO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cardpomo-dev")
    } else {
        base_dir.join("cardpomo")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
