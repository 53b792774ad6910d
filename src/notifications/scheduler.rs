// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! OS scheduler boundary and an in-memory backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc, Weekday};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ScheduleError, TimeOfDay};

/// Opaque handle for one registered trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(pub u64);

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trigger-{}", self.0)
    }
}

/// What a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Daily(TimeOfDay),
    Weekly(TimeOfDay, Weekday),
    Once(DateTime<Utc>),
}

/// Platform notification scheduler.
///
/// Implementations hand triggers to the OS; delivery happens there.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Remove every trigger this app registered.
    async fn cancel_all(&self) -> Result<(), ScheduleError>;

    async fn schedule_daily(&self, time: TimeOfDay) -> Result<TriggerId, ScheduleError>;

    /// One trigger per weekday.
    async fn schedule_weekly(
        &self,
        time: TimeOfDay,
        weekdays: &[Weekday],
    ) -> Result<Vec<TriggerId>, ScheduleError>;

    /// Rejected with [`ScheduleError::PastTimestamp`] when `at` is not after
    /// `now`, the clock the caller validated against.
    async fn schedule_once(
        &self,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TriggerId, ScheduleError>;
}

/// In-memory scheduler for tests and headless use.
pub struct InMemoryScheduler {
    triggers: DashMap<TriggerId, Trigger>,
    next_id: AtomicU64,
    cancel_calls: AtomicU64,
}

impl InMemoryScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            triggers: DashMap::new(),
            next_id: AtomicU64::new(1),
            cancel_calls: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.triggers.len()
    }

    /// Snapshot of active triggers, ordered by id.
    #[must_use]
    pub fn active(&self) -> Vec<(TriggerId, Trigger)> {
        let mut all: Vec<_> = self
            .triggers
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    #[must_use]
    pub fn cancel_calls(&self) -> u64 {
        self.cancel_calls.load(Ordering::Relaxed)
    }

    fn register(&self, trigger: Trigger) -> TriggerId {
        let id = TriggerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.triggers.insert(id, trigger);
        id
    }
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationScheduler for InMemoryScheduler {
    async fn cancel_all(&self) -> Result<(), ScheduleError> {
        self.cancel_calls.fetch_add(1, Ordering::Relaxed);
        self.triggers.clear();
        Ok(())
    }

    async fn schedule_daily(&self, time: TimeOfDay) -> Result<TriggerId, ScheduleError> {
        time.validate()?;
        Ok(self.register(Trigger::Daily(time)))
    }

    async fn schedule_weekly(
        &self,
        time: TimeOfDay,
        weekdays: &[Weekday],
    ) -> Result<Vec<TriggerId>, ScheduleError> {
        time.validate()?;
        if weekdays.is_empty() {
            return Err(ScheduleError::NoWeekdays);
        }
        Ok(weekdays
            .iter()
            .map(|day| self.register(Trigger::Weekly(time, *day)))
            .collect())
    }

    async fn schedule_once(
        &self,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TriggerId, ScheduleError> {
        if at <= now {
            return Err(ScheduleError::PastTimestamp { requested: at, now });
        }
        Ok(self.register(Trigger::Once(at)))
    }
}
