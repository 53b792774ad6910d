// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reminder notifications.
//!
//! The user's reminder choice is a synchronized preference
//! ([`NotificationSettings`]). Turning it into OS triggers is delegated to an
//! opaque [`NotificationScheduler`]; the [`NotificationPlanner`] always
//! cancels everything and registers the new set, so re-applying the same
//! settings never accumulates triggers.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use settings_sync::notifications::{
//!     InMemoryScheduler, NotificationPlanner, NotificationSettings, TimeOfDay,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Arc::new(InMemoryScheduler::new());
//! let planner = NotificationPlanner::new(scheduler.clone());
//!
//! let settings = NotificationSettings::daily(TimeOfDay::new(9, 0)?);
//! planner.reschedule(&settings, Utc::now()).await?;
//! planner.reschedule(&settings, Utc::now()).await?;
//! assert_eq!(scheduler.active_count(), 1);
//! # Ok(())
//! # }
//! ```

mod planner;
mod scheduler;

pub use planner::NotificationPlanner;
pub use scheduler::{InMemoryScheduler, NotificationScheduler, Trigger, TriggerId};

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preference::Preference;
use crate::synchronizer::SyncError;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("One-time reminder at {requested} is not after now ({now})")]
    PastTimestamp {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("Invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u8, minute: u8 },
    #[error("One-time reminder requires a date")]
    MissingDate,
    #[error("Weekly reminder requires at least one weekday")]
    NoWeekdays,
    #[error("Scheduler error: {0}")]
    Backend(String),
    #[error(transparent)]
    Preference(#[from] SyncError),
}

/// Wall-clock time at which a recurring reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        let time = Self { hour, minute };
        time.validate()?;
        Ok(time)
    }

    /// Deserialized values bypass [`TimeOfDay::new`], so check again before use.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.hour > 23 || self.minute > 59 {
            return Err(ScheduleError::InvalidTime {
                hour: self.hour,
                minute: self.minute,
            });
        }
        Ok(())
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// How often the reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    #[default]
    None,
    Daily,
    Weekly,
    Once,
}

impl NotificationFrequency {
    pub(crate) fn as_label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Once => "once",
        }
    }
}

/// Reminder preference, synced like any other preference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub frequency: NotificationFrequency,

    #[serde(default)]
    pub time: TimeOfDay,

    /// Only used by `weekly`
    #[serde(default)]
    pub weekdays: Vec<Weekday>,

    /// Only used by `once`
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl Preference for NotificationSettings {
    const KEY: &'static str = "notifications";
}

impl NotificationSettings {
    /// Reminders off.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn daily(time: TimeOfDay) -> Self {
        Self {
            frequency: NotificationFrequency::Daily,
            time,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn weekly(time: TimeOfDay, weekdays: impl Into<Vec<Weekday>>) -> Self {
        Self {
            frequency: NotificationFrequency::Weekly,
            time,
            weekdays: weekdays.into(),
            date: None,
        }
    }

    #[must_use]
    pub fn once(at: DateTime<Utc>) -> Self {
        Self {
            frequency: NotificationFrequency::Once,
            date: Some(at),
            ..Self::default()
        }
    }

    /// Check the settings can be turned into triggers at `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        match self.frequency {
            NotificationFrequency::None => Ok(()),
            NotificationFrequency::Daily => self.time.validate(),
            NotificationFrequency::Weekly => {
                self.time.validate()?;
                if self.weekdays.is_empty() {
                    return Err(ScheduleError::NoWeekdays);
                }
                Ok(())
            }
            NotificationFrequency::Once => {
                let requested = self.date.ok_or(ScheduleError::MissingDate)?;
                if requested <= now {
                    return Err(ScheduleError::PastTimestamp { requested, now });
                }
                Ok(())
            }
        }
    }
}
