use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{CardId, OwnerId, Phase};

/// Every applied transition produces an Event.
/// The CLI prints them; a GUI would forward them to its render layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        owner: OwnerId,
        card_id: Option<CardId>,
        /// True when a suspended work phase continued instead of starting fresh.
        resumed: bool,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        owner: OwnerId,
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    SessionSuspended {
        owner: OwnerId,
        phase: Phase,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    SessionFinished {
        owner: OwnerId,
        finished: Phase,
        next: Phase,
        card_id: Option<CardId>,
        today_count: u32,
        at: DateTime<Utc>,
    },
    CardRebound {
        owner: OwnerId,
        from: Option<CardId>,
        to: Option<CardId>,
        at: DateTime<Utc>,
    },
    /// Durations or day boundary changed; timing fields are untouched.
    SettingsChanged {
        owner: OwnerId,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        owner: OwnerId,
        phase: Phase,
        running: bool,
        elapsed_ms: u64,
        remaining_ms: u64,
        progress: f64,
        card_id: Option<CardId>,
        today_count: u32,
        daily_target: u32,
        at: DateTime<Utc>,
    },
}
