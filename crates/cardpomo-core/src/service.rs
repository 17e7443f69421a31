//! Applies engine transitions to stored sessions.
//!
//! Every operation reads the owner's document fresh, computes the transition
//! on that snapshot and writes it back with compare-and-swap. When another
//! writer got in first, the operation starts over from a new read, so a
//! precondition is always checked against the state it will replace. Side
//! effects run only once the write is committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::counter::CardSessionCounter;
use crate::error::{ConfigError, Result, StoreError, TransitionError};
use crate::events::Event;
use crate::notify::{LogNotifier, NotificationMessages, Notifier};
use crate::session::{CardId, DayBoundary, OwnerId, Phase, PomodoroConfig, SessionState, Versioned};
use crate::storage::{Config, SessionStore};
use crate::timer::engine::{self, Effect, Transition};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Knobs that do not live in the session document.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Durations given to sessions created lazily.
    pub defaults: PomodoroConfig,
    /// Day boundary given to sessions created lazily.
    pub day_boundary: DayBoundary,
    pub messages: NotificationMessages,
    /// Resume the following break as soon as a work phase finishes.
    pub auto_start_breaks: bool,
    /// Compare-and-swap attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            defaults: PomodoroConfig::default(),
            day_boundary: DayBoundary::default(),
            messages: NotificationMessages::default(),
            auto_start_breaks: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            defaults: config.pomodoro(),
            day_boundary: config.day_boundary()?,
            messages: config.notifications.clone(),
            auto_start_breaks: config.auto_start_breaks,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }
}

/// What happened to a requested transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Written to the store. `events` is in the order the transitions ran.
    Applied {
        state: SessionState,
        events: Vec<Event>,
    },
    /// Precondition did not hold; nothing was written.
    Ignored {
        state: SessionState,
        reason: TransitionError,
    },
}

impl Outcome {
    pub fn state(&self) -> &SessionState {
        match self {
            Outcome::Applied { state, .. } | Outcome::Ignored { state, .. } => state,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    pub fn events(&self) -> &[Event] {
        match self {
            Outcome::Applied { events, .. } => events,
            Outcome::Ignored { .. } => &[],
        }
    }
}

/// Read-side view of a session at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub owner: OwnerId,
    pub phase: Phase,
    pub running: bool,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub progress: f64,
    pub over_time: bool,
    pub card_id: Option<CardId>,
    /// Already adjusted for day rollover.
    pub today_count: u32,
    pub daily_target: u32,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

impl SessionStatus {
    pub fn of(state: &SessionState, now: DateTime<Utc>) -> Self {
        Self {
            owner: state.owner.clone(),
            phase: state.phase,
            running: state.is_running(),
            elapsed_ms: engine::elapsed_ms(state, now),
            remaining_ms: engine::remaining_ms(state, now),
            progress: engine::progress(state, now),
            over_time: engine::is_over_time(state, now),
            card_id: state.bound_card_id.clone(),
            today_count: engine::actual_today_count(state, now),
            daily_target: state.config.daily_target,
            last_completed_at: state.last_completed_at,
            at: now,
        }
    }

    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot {
            owner: self.owner.clone(),
            phase: self.phase,
            running: self.running,
            elapsed_ms: self.elapsed_ms,
            remaining_ms: self.remaining_ms,
            progress: self.progress,
            card_id: self.card_id.clone(),
            today_count: self.today_count,
            daily_target: self.daily_target,
            at: self.at,
        }
    }
}

/// Session operations for any number of owners over one store.
pub struct PomodoroService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    options: ServiceOptions,
}

impl<S: SessionStore> PomodoroService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            options: ServiceOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The owner's session, created with defaults on first access.
    pub fn session(&self, owner: &OwnerId) -> Result<SessionState> {
        Ok(self.load(owner)?.value)
    }

    pub fn status(&self, owner: &OwnerId) -> Result<SessionStatus> {
        let state = self.session(owner)?;
        Ok(SessionStatus::of(&state, self.clock.now()))
    }

    /// Whether `card_id` may start work for this owner right now.
    pub fn can_bind_card(&self, owner: &OwnerId, card_id: &CardId) -> Result<bool> {
        Ok(engine::can_bind_card(&self.session(owner)?, card_id))
    }

    pub fn card_count(&self, card_id: &CardId) -> Result<u64> {
        Ok(CardSessionCounter::new(&self.store).get(card_id)?)
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub fn start(&self, owner: &OwnerId, card_id: Option<&CardId>) -> Result<Outcome> {
        self.apply(owner, "start", |s, now| engine::start(s, card_id, now))
    }

    pub fn resume(&self, owner: &OwnerId) -> Result<Outcome> {
        self.apply(owner, "resume", engine::resume)
    }

    pub fn suspend(&self, owner: &OwnerId) -> Result<Outcome> {
        self.apply(owner, "suspend", engine::suspend)
    }

    /// End the running phase now, even with time left.
    pub fn finish(&self, owner: &OwnerId) -> Result<Outcome> {
        let outcome = self.apply(owner, "finish", engine::finish)?;
        self.after_finish(owner, outcome)
    }

    /// Finish only if the running phase is out of time. Called on timer expiry.
    pub fn expire(&self, owner: &OwnerId) -> Result<Outcome> {
        let outcome = self.apply(owner, "expire", engine::expire)?;
        self.after_finish(owner, outcome)
    }

    pub fn rebind_card(&self, owner: &OwnerId, card_id: Option<&CardId>) -> Result<Outcome> {
        self.apply(owner, "rebind", |s, now| engine::rebind_card(s, card_id, now))
    }

    /// One-button toggle for the card being viewed.
    pub fn click(&self, owner: &OwnerId, card_id: Option<&CardId>) -> Result<Outcome> {
        self.apply(owner, "click", |s, now| engine::click(s, card_id, now))
    }

    /// Replace the owner's durations. Timing state is kept as is.
    pub fn update_config(&self, owner: &OwnerId, config: PomodoroConfig) -> Result<Outcome> {
        config
            .validate()
            .map_err(|message| ConfigError::InvalidValue {
                key: "long_break_interval".into(),
                message,
            })?;
        self.apply(owner, "update_config", |s, now| {
            let mut state = s.clone();
            state.config = config.clone();
            Ok(settings_changed(state, now))
        })
    }

    pub fn set_day_boundary(&self, owner: &OwnerId, boundary: DayBoundary) -> Result<Outcome> {
        self.apply(owner, "set_day_boundary", |s, now| {
            let mut state = s.clone();
            state.day_boundary = boundary;
            Ok(settings_changed(state, now))
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn load(&self, owner: &OwnerId) -> Result<Versioned<SessionState>, StoreError> {
        if let Some(existing) = self.store.read_session(owner)? {
            return Ok(existing);
        }
        let fresh = SessionState::new(owner.clone())
            .with_config(self.options.defaults.clone())
            .with_day_boundary(self.options.day_boundary);
        tracing::info!(%owner, "creating session");
        self.store.create_session(&fresh)
    }

    fn apply<F>(&self, owner: &OwnerId, op: &'static str, transition: F) -> Result<Outcome>
    where
        F: Fn(&SessionState, DateTime<Utc>) -> Result<Transition, TransitionError>,
    {
        let attempts = self.options.max_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.load(owner)?;
            let now = self.clock.now();

            let Transition {
                state,
                effects,
                event,
            } = match transition(&current.value, now) {
                Ok(tr) => tr,
                Err(reason) => {
                    tracing::debug!(%owner, op, %reason, "transition ignored");
                    return Ok(Outcome::Ignored {
                        state: current.value,
                        reason,
                    });
                }
            };

            if !self.store.write_session(owner, current.version, &state)? {
                tracing::debug!(%owner, op, attempt, "session changed concurrently, retrying");
                continue;
            }

            tracing::info!(%owner, op, phase = ?state.phase, running = state.is_running(), "transition applied");
            self.run_effects(&effects)?;
            return Ok(Outcome::Applied {
                state,
                events: vec![event],
            });
        }

        Err(StoreError::Conflict {
            owner: owner.to_string(),
            attempts,
        }
        .into())
    }

    fn run_effects(&self, effects: &[Effect]) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::IncrementCard { card_id, owner } => {
                    CardSessionCounter::new(&self.store).increment(card_id, owner)?;
                }
                Effect::Notify(kind) => {
                    if let Some(notification) = self.options.messages.build(*kind) {
                        self.notifier.notify(&notification);
                    }
                }
            }
        }
        Ok(())
    }

    fn after_finish(&self, owner: &OwnerId, outcome: Outcome) -> Result<Outcome> {
        let (state, mut events) = match outcome {
            Outcome::Applied { state, events } => (state, events),
            ignored => return Ok(ignored),
        };
        if !(self.options.auto_start_breaks && state.phase.is_break()) {
            return Ok(Outcome::Applied { state, events });
        }

        match self.resume(owner)? {
            Outcome::Applied {
                state: resumed,
                events: more,
            } => {
                events.extend(more);
                Ok(Outcome::Applied {
                    state: resumed,
                    events,
                })
            }
            // Someone else already moved the session on; report the finish.
            Outcome::Ignored { .. } => Ok(Outcome::Applied { state, events }),
        }
    }
}

fn settings_changed(state: SessionState, now: DateTime<Utc>) -> Transition {
    let event = Event::SettingsChanged {
        owner: state.owner.clone(),
        at: now,
    };
    Transition {
        state,
        effects: Vec::new(),
        event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn service() -> (PomodoroService<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap(),
        ));
        let svc = PomodoroService::new(MemoryStore::new())
            .with_clock(clock.clone())
            .with_notifier(Arc::new(crate::notify::NullNotifier));
        (svc, clock)
    }

    #[test]
    fn first_access_creates_default_session() {
        let (svc, _) = service();
        let owner = OwnerId::new("u1");
        let s = svc.session(&owner).unwrap();
        assert_eq!(s.phase, Phase::Idle);
        assert!(svc.store().read_session(&owner).unwrap().is_some());
    }

    #[test]
    fn ignored_transition_writes_nothing() {
        let (svc, _) = service();
        let owner = OwnerId::new("u1");
        let before = svc.store().create_session(&SessionState::new(owner.clone())).unwrap();
        let out = svc.suspend(&owner).unwrap();
        assert!(matches!(
            out,
            Outcome::Ignored {
                reason: TransitionError::NotRunning,
                ..
            }
        ));
        let after = svc.store().read_session(&owner).unwrap().unwrap();
        assert_eq!(after.version, before.version);
    }

    #[test]
    fn auto_start_breaks_resumes_the_break() {
        let (svc, clock) = service();
        let svc = svc.with_options(ServiceOptions {
            auto_start_breaks: true,
            ..ServiceOptions::default()
        });
        let owner = OwnerId::new("u1");
        svc.start(&owner, None).unwrap();
        clock.advance(Duration::minutes(25));
        let out = svc.expire(&owner).unwrap();
        assert_eq!(out.state().phase, Phase::ShortBreak);
        assert!(out.state().is_running());
        assert_eq!(out.events().len(), 2);
    }

    #[test]
    fn update_config_rejects_zero_interval() {
        let (svc, _) = service();
        let mut cfg = PomodoroConfig::default();
        cfg.long_break_interval = 0;
        assert!(svc.update_config(&OwnerId::new("u1"), cfg).is_err());
    }

    #[test]
    fn moving_day_boundary_changes_today_count() {
        let (svc, clock) = service();
        let owner = OwnerId::new("u1");
        svc.start(&owner, None).unwrap();
        clock.advance(Duration::minutes(25));
        svc.expire(&owner).unwrap();
        clock.advance(Duration::minutes(65));
        assert_eq!(svc.status(&owner).unwrap().today_count, 1);

        // 10:00 lies between the completion (09:25) and now (10:30).
        let ten = chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let out = svc.set_day_boundary(&owner, DayBoundary::new(ten, 0)).unwrap();
        assert!(matches!(out.events(), [Event::SettingsChanged { .. }]));
        assert_eq!(out.state().day_boundary.time, ten);
        assert_eq!(svc.status(&owner).unwrap().today_count, 0);
    }

    #[test]
    fn update_config_keeps_timing_and_moves_remaining() {
        let (svc, clock) = service();
        let owner = OwnerId::new("u1");
        svc.start(&owner, None).unwrap();
        clock.advance(Duration::minutes(5));
        svc.suspend(&owner).unwrap();
        svc.start(&owner, None).unwrap();
        clock.advance(Duration::minutes(5));
        let before = svc.session(&owner).unwrap();
        assert_eq!(svc.status(&owner).unwrap().remaining_ms, 15 * 60 * 1000);

        let longer = PomodoroConfig::from_minutes(50, 10, 30, 4);
        let out = svc.update_config(&owner, longer.clone()).unwrap();
        assert!(out.is_applied());

        let after = svc.session(&owner).unwrap();
        assert_eq!(after.config, longer);
        assert_eq!(after.started_at, before.started_at);
        assert_eq!(after.accumulated_ms, before.accumulated_ms);
        assert_eq!(after.phase, Phase::Working);
        assert_eq!(svc.status(&owner).unwrap().remaining_ms, 40 * 60 * 1000);
    }

    #[test]
    fn status_snapshot_event_mirrors_status() {
        let (svc, clock) = service();
        let owner = OwnerId::new("u1");
        svc.start(&owner, Some(&CardId::new("c"))).unwrap();
        clock.advance(Duration::minutes(10));
        let status = svc.status(&owner).unwrap();
        match status.snapshot_event() {
            Event::StateSnapshot {
                phase,
                running,
                remaining_ms,
                card_id,
                ..
            } => {
                assert_eq!(phase, Phase::Working);
                assert!(running);
                assert_eq!(remaining_ms, 15 * 60 * 1000);
                assert_eq!(card_id, Some(CardId::new("c")));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn status_reports_rollover_adjusted_count() {
        let (svc, clock) = service();
        let owner = OwnerId::new("u1");
        svc.start(&owner, None).unwrap();
        clock.advance(Duration::minutes(25));
        svc.expire(&owner).unwrap();
        assert_eq!(svc.status(&owner).unwrap().today_count, 1);
        clock.advance(Duration::days(1));
        assert_eq!(svc.status(&owner).unwrap().today_count, 0);
    }
}
