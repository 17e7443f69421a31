//! Notification sink for phase completions.
//!
//! Delivery (desktop notification, alert box, terminal bell) belongs to the
//! host; the core only decides which message fires.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WorkFinished,
    BreakFinished,
}

impl NotificationKind {
    /// Translation key used by hosts with their own message catalogue.
    pub fn message_key(self) -> &'static str {
        match self {
            NotificationKind::WorkFinished => "end-pomodoro-notification",
            NotificationKind::BreakFinished => "end-pomodoro-break-notification",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Emits notifications as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            key = notification.kind.message_key(),
            "{}",
            notification.message
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) {}
}

/// Message text per kind, taken from the `[notifications]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationMessages {
    pub enabled: bool,
    pub work_message: String,
    pub break_message: String,
}

impl Default for NotificationMessages {
    fn default() -> Self {
        Self {
            enabled: true,
            work_message: "Pomodoro finished. Time for a break.".into(),
            break_message: "Break is over. Ready for the next pomodoro?".into(),
        }
    }
}

impl NotificationMessages {
    pub fn build(&self, kind: NotificationKind) -> Option<Notification> {
        if !self.enabled {
            return None;
        }
        let message = match kind {
            NotificationKind::WorkFinished => self.work_message.clone(),
            NotificationKind::BreakFinished => self.break_message.clone(),
        };
        Some(Notification { kind, message })
    }
}
