//! # cardpomo Core Library
//!
//! Pomodoro timing for a task-card application: one session per user that
//! moves between work and breaks, a daily completion count, and an optional
//! binding to the single card being worked on.
//!
//! ## Architecture
//!
//! - **Engine**: pure transitions over a session snapshot and an explicit `now`
//! - **Service**: applies transitions with compare-and-swap writes and runs
//!   their side effects (card counters, notifications) after commit
//! - **Scheduler**: tokio timers that finish a phase when it runs out and
//!   drive a once-per-second redraw
//! - **Storage**: SQLite session documents and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionState`]: the per-user session document
//! - [`PomodoroService`]: transition application over a [`SessionStore`]
//! - [`TimerScheduler`]: expiry and redraw timers
//! - [`CardSessionCounter`]: completed work phases per card

pub mod clock;
pub mod counter;
pub mod display;
pub mod error;
pub mod events;
pub mod notify;
pub mod service;
pub mod session;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{CardCounter, CardSessionCounter};
pub use display::{Glyph, RenderFrame, RenderSink, Tint};
pub use error::{ConfigError, CoreError, StoreError, TransitionError};
pub use events::Event;
pub use notify::{Notification, NotificationKind, Notifier};
pub use service::{Outcome, PomodoroService, ServiceOptions, SessionStatus};
pub use session::{CardId, DayBoundary, OwnerId, Phase, PomodoroConfig, SessionState, Versioned};
pub use storage::{Config, MemoryStore, SessionStore, SqliteStore};
pub use timer::{engine, CardContext, FixedCard, TimerScheduler};
