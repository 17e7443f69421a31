//! In-process store for tests and embedding hosts that persist elsewhere.

use std::collections::HashMap;
use std::sync::Mutex;

use super::SessionStore;
use crate::counter::CardCounter;
use crate::error::StoreError;
use crate::session::{CardId, OwnerId, SessionState, Versioned};

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<OwnerId, Versioned<SessionState>>>,
    counters: Mutex<HashMap<CardId, CardCounter>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn read_session(&self, owner: &OwnerId) -> Result<Option<Versioned<SessionState>>, StoreError> {
        Ok(self.sessions.lock()?.get(owner).cloned())
    }

    fn create_session(&self, state: &SessionState) -> Result<Versioned<SessionState>, StoreError> {
        let mut sessions = self.sessions.lock()?;
        let stored = sessions
            .entry(state.owner.clone())
            .or_insert_with(|| Versioned {
                version: 1,
                value: state.clone(),
            });
        Ok(stored.clone())
    }

    fn write_session(
        &self,
        owner: &OwnerId,
        expected_version: u64,
        state: &SessionState,
    ) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock()?;
        match sessions.get_mut(owner) {
            Some(current) if current.version == expected_version => {
                current.version += 1;
                current.value = state.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn read_counter(&self, card_id: &CardId) -> Result<Option<CardCounter>, StoreError> {
        Ok(self.counters.lock()?.get(card_id).cloned())
    }

    fn increment_counter(&self, card_id: &CardId, owner: &OwnerId) -> Result<CardCounter, StoreError> {
        let mut counters = self.counters.lock()?;
        let counter = counters.entry(card_id.clone()).or_insert_with(|| CardCounter {
            card_id: card_id.clone(),
            owner: owner.clone(),
            completed_count: 0,
        });
        counter.completed_count += 1;
        Ok(counter.clone())
    }
}
