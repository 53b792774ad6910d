// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use chrono::{DateTime, Utc, Weekday};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::synchronizer::{SettingsSynchronizer, SyncOutcome};

use super::{NotificationFrequency, NotificationScheduler, NotificationSettings, ScheduleError, TriggerId};

/// Turns [`NotificationSettings`] into scheduler triggers.
pub struct NotificationPlanner {
    scheduler: Arc<dyn NotificationScheduler>,
}

impl NotificationPlanner {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>) -> Self {
        Self { scheduler }
    }

    /// Replace every registered trigger with the ones `settings` asks for.
    ///
    /// Invalid settings are rejected before anything is cancelled, so a bad
    /// request leaves the current reminders in place. The scheduler checks
    /// one-shot dates against the same `now`. A backend error after the
    /// cancel still leaves no reminders registered.
    pub async fn reschedule(
        &self,
        settings: &NotificationSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<TriggerId>, ScheduleError> {
        let kind = settings.frequency.as_label();
        if let Err(e) = settings.validate(now) {
            warn!(kind, error = %e, "Rejected reminder settings");
            crate::metrics::record_schedule(kind, "rejected");
            return Err(e);
        }

        self.scheduler.cancel_all().await?;

        let result = match settings.frequency {
            NotificationFrequency::None => Ok(Vec::new()),
            NotificationFrequency::Daily => self
                .scheduler
                .schedule_daily(settings.time)
                .await
                .map(|id| vec![id]),
            NotificationFrequency::Weekly => {
                let days = distinct_weekdays(&settings.weekdays);
                self.scheduler.schedule_weekly(settings.time, &days).await
            }
            NotificationFrequency::Once => match settings.date {
                Some(at) => self.scheduler.schedule_once(at, now).await.map(|id| vec![id]),
                None => Err(ScheduleError::MissingDate),
            },
        };

        match &result {
            Ok(ids) => {
                crate::metrics::record_schedule(kind, "success");
                info!(kind, triggers = ids.len(), "Reminders rescheduled");
            }
            Err(e) => {
                crate::metrics::record_schedule(kind, "error");
                warn!(kind, error = %e, "Scheduler refused reminder");
            }
        }
        result
    }

    /// Save `settings` as a synced preference, then reschedule.
    pub async fn apply(
        &self,
        sync: &SettingsSynchronizer,
        settings: &NotificationSettings,
        now: DateTime<Utc>,
    ) -> Result<(SyncOutcome, Vec<TriggerId>), ScheduleError> {
        settings.validate(now)?;
        let outcome = sync.set(settings).await?;
        debug!(?outcome, "Reminder settings saved");
        let triggers = self.reschedule(settings, now).await?;
        Ok((outcome, triggers))
    }
}

fn distinct_weekdays(days: &[Weekday]) -> Vec<Weekday> {
    let mut out: Vec<Weekday> = Vec::with_capacity(days.len());
    for day in days {
        if !out.contains(day) {
            out.push(*day);
        }
    }
    out.sort_by_key(Weekday::num_days_from_monday);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{InMemoryScheduler, TimeOfDay, Trigger};
    use chrono::Duration;

    fn planner() -> (Arc<InMemoryScheduler>, NotificationPlanner) {
        let scheduler = Arc::new(InMemoryScheduler::new());
        (scheduler.clone(), NotificationPlanner::new(scheduler))
    }

    #[tokio::test]
    async fn test_daily_reschedule_is_idempotent() {
        let (scheduler, planner) = planner();
        let settings = NotificationSettings::daily(TimeOfDay::new(9, 0).unwrap());

        planner.reschedule(&settings, Utc::now()).await.unwrap();
        planner.reschedule(&settings, Utc::now()).await.unwrap();

        let active = scheduler.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].1, Trigger::Daily(TimeOfDay { hour: 9, minute: 0 }));
        assert_eq!(scheduler.cancel_calls(), 2);
    }

    #[tokio::test]
    async fn test_none_cancels_everything() {
        let (scheduler, planner) = planner();
        planner
            .reschedule(&NotificationSettings::daily(TimeOfDay::default()), Utc::now())
            .await
            .unwrap();

        let ids = planner
            .reschedule(&NotificationSettings::none(), Utc::now())
            .await
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[tokio::test]
    async fn test_weekly_dedupes_days() {
        let (scheduler, planner) = planner();
        let settings = NotificationSettings::weekly(
            TimeOfDay::default(),
            vec![Weekday::Fri, Weekday::Mon, Weekday::Fri],
        );
        let ids = planner.reschedule(&settings, Utc::now()).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(scheduler.active_count(), 2);
    }

    #[tokio::test]
    async fn test_past_once_keeps_existing_triggers() {
        let (scheduler, planner) = planner();
        let now = Utc::now();
        planner
            .reschedule(&NotificationSettings::daily(TimeOfDay::default()), now)
            .await
            .unwrap();

        let result = planner
            .reschedule(&NotificationSettings::once(now - Duration::seconds(1)), now)
            .await;

        assert!(matches!(result, Err(ScheduleError::PastTimestamp { .. })));
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn test_once_checked_against_callers_clock() {
        let (scheduler, planner) = planner();
        let now = Utc::now() - Duration::hours(2);
        planner
            .reschedule(&NotificationSettings::daily(TimeOfDay::default()), now)
            .await
            .unwrap();

        // Past by the wall clock, future by the reference clock
        let at = now + Duration::hours(1);
        let ids = planner
            .reschedule(&NotificationSettings::once(at), now)
            .await
            .unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(scheduler.active(), vec![(ids[0], Trigger::Once(at))]);
    }

    #[test]
    fn test_distinct_weekdays_sorted() {
        let days = distinct_weekdays(&[Weekday::Sun, Weekday::Tue, Weekday::Sun]);
        assert_eq!(days, vec![Weekday::Tue, Weekday::Sun]);
    }
}
