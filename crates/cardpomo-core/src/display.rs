//! Per-tick render data for a circular countdown widget.
//!
//! Drawing is the host's job. This module decides what the widget shows:
//! the countdown label, how much of the ring is filled, which glyph sits
//! under the label and which colour role applies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{CardId, Phase, SessionState};
use crate::timer::engine;

/// Icon under the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Glyph {
    /// Clicking starts or resumes.
    Play,
    /// Clicking suspends.
    Pause,
    /// The widget is inert for the viewed card.
    None,
}

/// Colour role of the ring and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tint {
    Active,
    Break,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub phase: Phase,
    pub running: bool,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    /// Filled share of the ring, `0.0..=1.0`.
    pub progress: f64,
    /// `MM:SS` of the time left.
    pub label: String,
    pub glyph: Glyph,
    pub tint: Tint,
    pub can_bind_card: bool,
    pub today_count: u32,
    pub daily_target: u32,
}

impl RenderFrame {
    /// Frame for `state` as seen from the card the user is viewing.
    pub fn compute(state: &SessionState, viewing: Option<&CardId>, now: DateTime<Utc>) -> Self {
        let elapsed_ms = engine::elapsed_ms(state, now);
        let duration_ms = engine::phase_duration_ms(state);
        let can_bind_card = viewing.map_or(true, |card| engine::can_bind_card(state, card));
        let on_break = state.phase.is_break();
        let running = state.is_running();

        let tint = if on_break {
            Tint::Break
        } else if can_bind_card {
            Tint::Active
        } else {
            Tint::Disabled
        };
        let glyph = match (on_break || can_bind_card, running) {
            (false, _) => Glyph::None,
            (true, true) => Glyph::Pause,
            (true, false) => Glyph::Play,
        };

        Self {
            phase: state.phase,
            running,
            elapsed_ms,
            remaining_ms: engine::remaining_ms(state, now),
            progress: engine::progress(state, now),
            label: countdown_label(duration_ms, elapsed_ms),
            glyph,
            tint,
            can_bind_card,
            today_count: engine::actual_today_count(state, now),
            daily_target: state.config.daily_target,
        }
    }
}

/// Remaining time as `MM:SS`, both ends rounded to whole seconds first.
pub fn countdown_label(duration_ms: u64, elapsed_ms: u64) -> String {
    let total_secs = round_secs(duration_ms);
    let elapsed_secs = round_secs(elapsed_ms);
    let remaining = total_secs.saturating_sub(elapsed_secs);
    format!("{:02}:{:02}", remaining / 60, remaining % 60)
}

fn round_secs(ms: u64) -> u64 {
    ms.saturating_add(500) / 1000
}

pub trait RenderSink: Send + Sync {
    fn render(&self, frame: &RenderFrame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OwnerId;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn label_counts_down_and_clamps() {
        assert_eq!(countdown_label(25 * 60 * 1000, 0), "25:00");
        assert_eq!(countdown_label(25 * 60 * 1000, 61_400), "23:59");
        assert_eq!(countdown_label(25 * 60 * 1000, 26 * 60 * 1000), "00:00");
        assert_eq!(countdown_label(0, 0), "00:00");
    }

    #[test]
    fn idle_frame_is_full_and_playable() {
        let s = SessionState::new(OwnerId::new("u"));
        let f = RenderFrame::compute(&s, Some(&CardId::new("a")), t0());
        assert_eq!(f.progress, 1.0);
        assert_eq!(f.glyph, Glyph::Play);
        assert_eq!(f.tint, Tint::Active);
    }

    #[test]
    fn foreign_card_sees_disabled_widget() {
        let s = SessionState::new(OwnerId::new("u"));
        let s = engine::start(&s, Some(&CardId::new("a")), t0()).unwrap().state;
        let now = t0() + Duration::minutes(5);

        let own = RenderFrame::compute(&s, Some(&CardId::new("a")), now);
        assert_eq!(own.glyph, Glyph::Pause);
        assert_eq!(own.tint, Tint::Active);
        assert_eq!(own.label, "20:00");

        let other = RenderFrame::compute(&s, Some(&CardId::new("b")), now);
        assert!(!other.can_bind_card);
        assert_eq!(other.glyph, Glyph::None);
        assert_eq!(other.tint, Tint::Disabled);
    }

    #[test]
    fn break_uses_break_tint_for_any_card() {
        let s = SessionState::new(OwnerId::new("u"));
        let s = engine::start(&s, Some(&CardId::new("a")), t0()).unwrap().state;
        let s = engine::finish(&s, t0() + Duration::minutes(25)).unwrap().state;
        let f = RenderFrame::compute(&s, Some(&CardId::new("b")), t0() + Duration::minutes(25));
        assert_eq!(f.tint, Tint::Break);
        assert_eq!(f.glyph, Glyph::Play);
        assert_eq!(f.label, "05:00");
    }
}
