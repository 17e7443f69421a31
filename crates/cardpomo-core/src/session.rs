//! Session document: the persisted state of one user's pomodoro timer.
//!
//! Exactly one [`SessionState`] exists per owner. It carries no behaviour
//! beyond accessors; transitions live in [`crate::timer::engine`].

use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

const MINUTE_MS: u64 = 60 * 1000;

/// Identity of the user owning a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a task card in the host application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which part of the pomodoro cycle the session is in.
///
/// Whether the phase is counting time is a separate fact, recorded by
/// `started_at` on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Working,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::ShortBreak | Phase::LongBreak)
    }

    pub fn is_working(self) -> bool {
        self == Phase::Working
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Working => "working",
            Phase::ShortBreak => "short break",
            Phase::LongBreak => "long break",
        }
    }
}

/// Phase lengths and cadence, all durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroConfig {
    pub work_ms: u64,
    pub short_break_ms: u64,
    pub long_break_ms: u64,
    /// Every n-th completed work phase of the day is followed by a long break.
    pub long_break_interval: u32,
    /// Informational only.
    pub daily_target: u32,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            work_ms: 25 * MINUTE_MS,
            short_break_ms: 5 * MINUTE_MS,
            long_break_ms: 15 * MINUTE_MS,
            long_break_interval: 4,
            daily_target: 10,
        }
    }
}

impl PomodoroConfig {
    /// Build from whole minutes, the unit the config file uses.
    pub fn from_minutes(work: u64, short_break: u64, long_break: u64, interval: u32) -> Self {
        Self {
            work_ms: work.saturating_mul(MINUTE_MS),
            short_break_ms: short_break.saturating_mul(MINUTE_MS),
            long_break_ms: long_break.saturating_mul(MINUTE_MS),
            long_break_interval: interval,
            ..Self::default()
        }
    }

    /// Reject configurations the cadence rule cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.long_break_interval == 0 {
            return Err("long_break_interval must be at least 1".into());
        }
        Ok(())
    }
}

/// Time of day at which the daily counter resets.
///
/// Only the time-of-day matters. It is interpreted in the fixed UTC offset
/// stored alongside it, so rollover does not depend on the host's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBoundary {
    pub time: NaiveTime,
    #[serde(default)]
    pub utc_offset_secs: i32,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            time: NaiveTime::MIN,
            utc_offset_secs: 0,
        }
    }
}

impl DayBoundary {
    pub fn new(time: NaiveTime, utc_offset_secs: i32) -> Self {
        Self {
            time,
            utc_offset_secs,
        }
    }

    /// The boundary instant on the calendar day `now` falls on.
    pub fn on_day_of(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let offset = chrono::FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix());
        let local_date = now.with_timezone(&offset).date_naive();
        let local_boundary = local_date.and_time(self.time);
        let utc_naive = local_boundary - Duration::seconds(i64::from(offset.local_minus_utc()));
        DateTime::<Utc>::from_naive_utc_and_offset(utc_naive, Utc)
    }
}

/// One user's timer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub owner: OwnerId,
    pub config: PomodoroConfig,
    /// Set iff the current phase is counting wall-clock time.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Time banked while suspended.
    #[serde(default)]
    pub accumulated_ms: u64,
    pub phase: Phase,
    /// Card claiming the work phase; only ever set while `phase == Working`.
    #[serde(default)]
    pub bound_card_id: Option<CardId>,
    #[serde(default)]
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub day_boundary: DayBoundary,
    /// Raw stored count; read it through `engine::actual_today_count`.
    #[serde(default)]
    pub today_count: u32,
}

impl SessionState {
    /// The default document created lazily on first access.
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            config: PomodoroConfig::default(),
            started_at: None,
            accumulated_ms: 0,
            phase: Phase::Idle,
            bound_card_id: None,
            last_completed_at: None,
            day_boundary: DayBoundary::default(),
            today_count: 0,
        }
    }

    pub fn with_config(mut self, config: PomodoroConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_day_boundary(mut self, boundary: DayBoundary) -> Self {
        self.day_boundary = boundary;
        self
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Frozen in a non-idle phase, waiting for a start or resume.
    pub fn is_suspended(&self) -> bool {
        self.started_at.is_none() && self.phase != Phase::Idle
    }
}

/// A stored document together with its compare-and-swap version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn break_predicate_covers_both_break_lengths() {
        assert!(Phase::ShortBreak.is_break());
        assert!(Phase::LongBreak.is_break());
        assert!(!Phase::Working.is_break());
        assert!(!Phase::Idle.is_break());
    }

    #[test]
    fn default_session_is_idle_with_standard_durations() {
        let s = SessionState::new(OwnerId::new("u1"));
        assert_eq!(s.phase, Phase::Idle);
        assert!(!s.is_running());
        assert!(!s.is_suspended());
        assert_eq!(s.config.work_ms, 25 * 60 * 1000);
        assert_eq!(s.config.short_break_ms, 5 * 60 * 1000);
        assert_eq!(s.config.long_break_ms, 15 * 60 * 1000);
        assert_eq!(s.config.long_break_interval, 4);
        assert_eq!(s.config.daily_target, 10);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = PomodoroConfig::default();
        cfg.long_break_interval = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn boundary_uses_today_in_utc() {
        let boundary = DayBoundary::new(NaiveTime::from_hms_opt(4, 30, 0).unwrap(), 0);
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            boundary.on_day_of(now),
            Utc.with_ymd_and_hms(2024, 3, 10, 4, 30, 0).unwrap()
        );
    }

    #[test]
    fn boundary_respects_offset() {
        // 00:00 at UTC+9 is 15:00 UTC the previous day.
        let boundary = DayBoundary::new(NaiveTime::MIN, 9 * 3600);
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 16, 0, 0).unwrap();
        assert_eq!(
            boundary.on_day_of(now),
            Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn session_document_roundtrips_through_json() {
        let mut s = SessionState::new(OwnerId::new("u1"));
        s.phase = Phase::ShortBreak;
        s.today_count = 3;
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"short_break\""));
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
