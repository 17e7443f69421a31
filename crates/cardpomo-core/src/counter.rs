//! Per-card tally of completed work phases.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::session::{CardId, OwnerId};
use crate::storage::SessionStore;

/// Completed work phases recorded against one card. Never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCounter {
    pub card_id: CardId,
    /// Identity that created the entry.
    pub owner: OwnerId,
    pub completed_count: u64,
}

/// Counter operations on top of a store.
///
/// The store performs the increment atomically, so a card shared between
/// users never loses a completion. Deduplication is not done here: the
/// engine emits at most one increment per finished work phase.
pub struct CardSessionCounter<'a, S: SessionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SessionStore + ?Sized> CardSessionCounter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create the entry at zero if needed, then add one. Returns the new count.
    pub fn increment(&self, card_id: &CardId, owner: &OwnerId) -> Result<u64, StoreError> {
        let counter = self.store.increment_counter(card_id, owner)?;
        tracing::debug!(card = %card_id, count = counter.completed_count, "card counter incremented");
        Ok(counter.completed_count)
    }

    /// Current count, 0 when the card never completed a session.
    pub fn get(&self, card_id: &CardId) -> Result<u64, StoreError> {
        Ok(self
            .store
            .read_counter(card_id)?
            .map(|c| c.completed_count)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn missing_card_reads_zero() {
        let store = MemoryStore::new();
        let counter = CardSessionCounter::new(&store);
        assert_eq!(counter.get(&CardId::new("nope")).unwrap(), 0);
    }

    #[test]
    fn increment_creates_lazily_then_adds() {
        let store = MemoryStore::new();
        let counter = CardSessionCounter::new(&store);
        let card = CardId::new("c1");
        let owner = OwnerId::new("u1");
        assert_eq!(counter.increment(&card, &owner).unwrap(), 1);
        assert_eq!(counter.increment(&card, &owner).unwrap(), 2);
        assert_eq!(counter.get(&card).unwrap(), 2);
    }
}
