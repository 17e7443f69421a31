//! Pomodoro session engine.
//!
//! Pure functions over a [`SessionState`] snapshot and an explicit `now`.
//! Nothing here reads the clock or touches storage: a transition returns the
//! next document plus the side effects the caller must apply once that
//! document has been written.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Working --finish--> (ShortBreak | LongBreak) --finish--> Idle
//!                    ^                          |
//!                    +---------- start ---------+
//! ```
//!
//! Any non-idle phase may additionally be frozen (`started_at == None`) and
//! later continued without losing banked time.

use chrono::{DateTime, Utc};

use crate::error::TransitionError;
use crate::events::Event;
use crate::notify::NotificationKind;
use crate::session::{CardId, OwnerId, Phase, SessionState};

/// Work the caller performs after the new state has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add one completed work phase to the card's counter.
    IncrementCard { card_id: CardId, owner: OwnerId },
    /// Tell the user the phase ended.
    Notify(NotificationKind),
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
    pub event: Event,
}

// ── Queries ──────────────────────────────────────────────────────────

/// Banked time plus time counted since the phase was last started.
///
/// A `now` earlier than `started_at` (clock step backwards) counts as zero.
pub fn elapsed_ms(s: &SessionState, now: DateTime<Utc>) -> u64 {
    let running = s
        .started_at
        .map(|started| u64::try_from((now - started).num_milliseconds()).unwrap_or(0))
        .unwrap_or(0);
    s.accumulated_ms.saturating_add(running)
}

/// Length of the current phase. Idle has none and is always over time.
pub fn phase_duration_ms(s: &SessionState) -> u64 {
    match s.phase {
        Phase::Idle => 0,
        Phase::Working => s.config.work_ms,
        Phase::ShortBreak => s.config.short_break_ms,
        Phase::LongBreak => s.config.long_break_ms,
    }
}

pub fn remaining_ms(s: &SessionState, now: DateTime<Utc>) -> u64 {
    phase_duration_ms(s).saturating_sub(elapsed_ms(s, now))
}

pub fn is_over_time(s: &SessionState, now: DateTime<Utc>) -> bool {
    elapsed_ms(s, now) >= phase_duration_ms(s)
}

/// Fraction of the phase completed, clamped to `0.0..=1.0`.
/// A zero-length phase counts as complete.
pub fn progress(s: &SessionState, now: DateTime<Utc>) -> f64 {
    let duration = phase_duration_ms(s);
    if duration == 0 {
        return 1.0;
    }
    (elapsed_ms(s, now) as f64 / duration as f64).min(1.0)
}

/// Whether `card_id` may claim the work phase.
pub fn can_bind_card(s: &SessionState, card_id: &CardId) -> bool {
    s.bound_card_id.as_ref().map_or(true, |bound| bound == card_id)
}

/// The daily counter as of `now`.
///
/// The stored count is discarded once today's boundary has passed since the
/// last completion.
pub fn actual_today_count(s: &SessionState, now: DateTime<Utc>) -> u32 {
    let Some(last) = s.last_completed_at else {
        return s.today_count;
    };
    let boundary = s.day_boundary.on_day_of(now);
    if last < boundary && boundary <= now {
        0
    } else {
        s.today_count
    }
}

// ── Transitions ──────────────────────────────────────────────────────

/// Begin (or continue) a work phase, optionally claiming `card_id`.
///
/// A suspended work phase continues with its banked time. From Idle or any
/// break a fresh work phase begins; the break does not have to end first.
pub fn start(
    s: &SessionState,
    card_id: Option<&CardId>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if let (Some(card), Some(bound)) = (card_id, s.bound_card_id.as_ref()) {
        if card != bound {
            return Err(TransitionError::CardMismatch {
                bound: bound.to_string(),
                requested: card.to_string(),
            });
        }
    }

    let mut next = s.clone();
    let resumed = match (s.phase, s.is_running()) {
        (Phase::Working, true) => return Err(TransitionError::AlreadyRunning),
        (Phase::Working, false) => {
            if let Some(card) = card_id {
                next.bound_card_id = Some(card.clone());
            }
            true
        }
        _ => {
            next.phase = Phase::Working;
            next.accumulated_ms = 0;
            next.bound_card_id = card_id.cloned();
            false
        }
    };
    next.started_at = Some(now);

    let event = Event::SessionStarted {
        owner: next.owner.clone(),
        card_id: next.bound_card_id.clone(),
        resumed,
        remaining_ms: remaining_ms(&next, now),
        at: now,
    };
    Ok(Transition {
        state: next,
        effects: Vec::new(),
        event,
    })
}

/// Continue a frozen phase of any kind, keeping its banked time.
pub fn resume(s: &SessionState, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    if s.phase == Phase::Idle {
        return Err(TransitionError::Idle);
    }
    if s.is_running() {
        return Err(TransitionError::NotSuspended);
    }

    let mut next = s.clone();
    next.started_at = Some(now);
    let event = Event::SessionResumed {
        owner: next.owner.clone(),
        phase: next.phase,
        remaining_ms: remaining_ms(&next, now),
        at: now,
    };
    Ok(Transition {
        state: next,
        effects: Vec::new(),
        event,
    })
}

/// Freeze the running phase in place.
pub fn suspend(s: &SessionState, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    if !s.is_running() {
        return Err(TransitionError::NotRunning);
    }

    let mut next = s.clone();
    next.accumulated_ms = elapsed_ms(s, now);
    next.started_at = None;
    let event = Event::SessionSuspended {
        owner: next.owner.clone(),
        phase: next.phase,
        elapsed_ms: next.accumulated_ms,
        at: now,
    };
    Ok(Transition {
        state: next,
        effects: Vec::new(),
        event,
    })
}

/// End the running phase, whether or not its time is up.
///
/// Only a running session can finish, so a second call without an
/// intervening start is rejected and no counter is incremented twice.
pub fn finish(s: &SessionState, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    if !s.is_running() {
        return Err(TransitionError::NotRunning);
    }
    if s.phase == Phase::Idle {
        return Err(TransitionError::Idle);
    }

    // Rollover first, then increment.
    let mut today_count = actual_today_count(s, now);
    let mut effects = Vec::new();

    let next_phase = if s.phase.is_working() {
        today_count = today_count.saturating_add(1);
        if let Some(card_id) = &s.bound_card_id {
            effects.push(Effect::IncrementCard {
                card_id: card_id.clone(),
                owner: s.owner.clone(),
            });
        }
        effects.push(Effect::Notify(NotificationKind::WorkFinished));
        if today_count % s.config.long_break_interval.max(1) == 0 {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        }
    } else {
        effects.push(Effect::Notify(NotificationKind::BreakFinished));
        Phase::Idle
    };

    let mut next = s.clone();
    next.started_at = None;
    next.accumulated_ms = 0;
    next.phase = next_phase;
    next.bound_card_id = None;
    next.today_count = today_count;
    next.last_completed_at = Some(now);

    let event = Event::SessionFinished {
        owner: next.owner.clone(),
        finished: s.phase,
        next: next_phase,
        card_id: s.bound_card_id.clone(),
        today_count,
        at: now,
    };
    Ok(Transition {
        state: next,
        effects,
        event,
    })
}

/// Scheduler-driven finish: only when the running phase has run out.
pub fn expire(s: &SessionState, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    if !s.is_running() {
        return Err(TransitionError::NotRunning);
    }
    if !is_over_time(s, now) {
        return Err(TransitionError::NotDue {
            remaining_ms: remaining_ms(s, now),
        });
    }
    finish(s, now)
}

/// Change or clear the bound card without touching any timing.
///
/// A card can only be bound while a work phase exists; outside of one the
/// binding may only be cleared.
pub fn rebind_card(
    s: &SessionState,
    card_id: Option<&CardId>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if card_id.is_some() && !s.phase.is_working() {
        return Err(TransitionError::BindOutsideWork { phase: s.phase });
    }

    let mut next = s.clone();
    next.bound_card_id = card_id.cloned();
    let event = Event::CardRebound {
        owner: next.owner.clone(),
        from: s.bound_card_id.clone(),
        to: next.bound_card_id.clone(),
        at: now,
    };
    Ok(Transition {
        state: next,
        effects: Vec::new(),
        event,
    })
}

/// The single-button toggle: pause what runs, otherwise get going.
///
/// Clicking a card other than the one being worked on does nothing. A
/// pending break is started rather than skipped.
pub fn click(
    s: &SessionState,
    card_id: Option<&CardId>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if !s.phase.is_break() {
        if let (Some(card), Some(bound)) = (card_id, s.bound_card_id.as_ref()) {
            if card != bound {
                return Err(TransitionError::CardMismatch {
                    bound: bound.to_string(),
                    requested: card.to_string(),
                });
            }
        }
    }

    if s.is_running() {
        suspend(s, now)
    } else if s.phase.is_break() {
        resume(s, now)
    } else {
        start(s, card_id, now)
    }
}
