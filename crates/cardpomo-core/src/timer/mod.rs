pub mod engine;
mod scheduler;

pub use engine::{Effect, Transition};
pub use scheduler::{CardContext, FixedCard, TimerScheduler};
