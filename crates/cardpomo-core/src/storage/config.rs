//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Phase durations and long-break cadence
//! - The daily counter's reset time
//! - Notification texts
//! - Owner identity and scheduler tick rate
//!
//! Configuration is stored at `~/.config/cardpomo/config.toml`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveTime, Offset};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::notify::NotificationMessages;
use crate::session::{DayBoundary, OwnerId, PomodoroConfig};

/// Phase lengths, in minutes as users think of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u64,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u64,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u64,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default = "default_daily_target")]
    pub daily_target: u32,
}

/// When the daily counter resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBoundaryConfig {
    /// `HH:MM` or `HH:MM:SS`.
    #[serde(default = "default_boundary_time")]
    pub time: String,
    /// Minutes east of UTC. Unset means the host's current offset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    /// Owner id used by the CLI. Filled in on first use when empty.
    #[serde(default)]
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/cardpomo/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub day_boundary: DayBoundaryConfig,
    #[serde(default)]
    pub notifications: NotificationMessages,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Start the break as soon as a work phase ends.
    #[serde(default)]
    pub auto_start_breaks: bool,
}

fn default_work_minutes() -> u64 {
    25
}
fn default_short_break() -> u64 {
    5
}
fn default_long_break() -> u64 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_daily_target() -> u32 {
    10
}
fn default_boundary_time() -> String {
    "00:00".into()
}
fn default_tick_secs() -> u64 {
    1
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            long_break_interval: default_long_break_interval(),
            daily_target: default_daily_target(),
        }
    }
}

impl Default for DayBoundaryConfig {
    fn default() -> Self {
        Self {
            time: default_boundary_time(),
            utc_offset_minutes: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            day_boundary: DayBoundaryConfig::default(),
            notifications: NotificationMessages::default(),
            identity: IdentityConfig::default(),
            scheduler: SchedulerConfig::default(),
            auto_start_breaks: false,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    // Optional numbers serialize as null.
                    serde_json::Value::Null => match value.parse::<i64>() {
                        Ok(n) => serde_json::Value::Number(n.into()),
                        Err(_) if value == "none" || value.is_empty() => serde_json::Value::Null,
                        Err(_) => serde_json::Value::String(value.into()),
                    },
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()
            .map_err(|e| ConfigError::DataDir(e.to_string()))?
            .join("config.toml"))
    }

    /// Load from the default location, writing defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pomodoro()
            .validate()
            .map_err(|message| ConfigError::InvalidValue {
                key: "timer.long_break_interval".into(),
                message,
            })?;
        self.boundary_time()?;
        if self.scheduler.tick_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.tick_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Session durations derived from the `[timer]` section.
    pub fn pomodoro(&self) -> PomodoroConfig {
        PomodoroConfig {
            daily_target: self.timer.daily_target,
            ..PomodoroConfig::from_minutes(
                self.timer.work_minutes,
                self.timer.short_break_minutes,
                self.timer.long_break_minutes,
                self.timer.long_break_interval,
            )
        }
    }

    fn boundary_time(&self) -> Result<NaiveTime, ConfigError> {
        let raw = self.day_boundary.time.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|e| ConfigError::InvalidValue {
                key: "day_boundary.time".into(),
                message: format!("'{raw}': {e}"),
            })
    }

    /// The day boundary, resolving an unset offset to the host's.
    pub fn day_boundary(&self) -> Result<DayBoundary, ConfigError> {
        let offset_secs = match self.day_boundary.utc_offset_minutes {
            Some(minutes) => minutes.saturating_mul(60),
            None => Local::now().offset().fix().local_minus_utc(),
        };
        Ok(DayBoundary::new(self.boundary_time()?, offset_secs))
    }

    /// The configured owner, falling back to `$USER` and then a fresh UUID.
    ///
    /// Returns whether the identity was newly assigned so the caller can save it.
    pub fn ensure_owner(&mut self) -> (OwnerId, bool) {
        if !self.identity.owner.trim().is_empty() {
            return (OwnerId::new(self.identity.owner.trim()), false);
        }
        let owner = std::env::var("USER")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.identity.owner = owner.clone();
        (OwnerId::new(owner), true)
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.work_minutes, 25);
        assert_eq!(parsed.day_boundary.time, "00:00");
        assert!(!parsed.auto_start_breaks);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.work_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("timer.long_break_interval", "3").unwrap();
        cfg.set("auto_start_breaks", "true").unwrap();
        cfg.set("day_boundary.time", "04:30").unwrap();
        cfg.set("day_boundary.utc_offset_minutes", "-300").unwrap();
        assert_eq!(cfg.timer.long_break_interval, 3);
        assert!(cfg.auto_start_breaks);
        let boundary = cfg.day_boundary().unwrap();
        assert_eq!(boundary.time, NaiveTime::from_hms_opt(4, 30, 0).unwrap());
        assert_eq!(boundary.utc_offset_secs, -300 * 60);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("auto_start_breaks", "not_a_bool").is_err());
        assert!(cfg.set("timer.work_minutes", "soon").is_err());
    }

    #[test]
    fn set_rejects_zero_interval_and_keeps_old_value() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.long_break_interval", "0").is_err());
        assert_eq!(cfg.timer.long_break_interval, 4);
    }

    #[test]
    fn bad_boundary_time_fails_validation() {
        let mut cfg = Config::default();
        cfg.day_boundary.time = "25:99".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pomodoro_durations_in_ms() {
        let mut cfg = Config::default();
        cfg.timer.work_minutes = 50;
        cfg.timer.daily_target = 6;
        let p = cfg.pomodoro();
        assert_eq!(p.work_ms, 50 * 60 * 1000);
        assert_eq!(p.short_break_ms, 5 * 60 * 1000);
        assert_eq!(p.daily_target, 6);
    }

    #[test]
    fn configured_owner_wins() {
        let mut cfg = Config::default();
        cfg.identity.owner = "alice".into();
        assert_eq!(cfg.ensure_owner(), (OwnerId::new("alice"), false));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.timer.work_minutes, 25);
        assert!(path.exists());
    }
}
