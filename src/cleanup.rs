// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Completed-record cleanup policy.
//!
//! The policy is a synced preference; the bulk delete itself belongs to the
//! document backend. This module only answers "is a run due" and "which
//! records are old enough".

use serde::{Deserialize, Serialize};

use crate::preference::Preference;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupInterval {
    Daily,
    #[default]
    Weekly,
}

impl CleanupInterval {
    #[must_use]
    pub fn period_millis(self) -> i64 {
        match self {
            Self::Daily => DAY_MILLIS,
            Self::Weekly => 7 * DAY_MILLIS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Completed records older than this are purged
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default)]
    pub interval: CleanupInterval,
}

fn default_retention_days() -> u32 { 30 }

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            retention_days: default_retention_days(),
            interval: CleanupInterval::default(),
        }
    }
}

impl Preference for CleanupSettings {
    const KEY: &'static str = "cleanup";
}

impl CleanupSettings {
    /// Epoch millis before which completed records are purged.
    #[must_use]
    pub fn cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(i64::from(self.retention_days).saturating_mul(DAY_MILLIS))
    }

    /// Whether a cleanup run should happen now. Never due while disabled.
    #[must_use]
    pub fn is_due(&self, last_run: Option<i64>, now: i64) -> bool {
        if !self.enabled {
            return false;
        }
        match last_run {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval.period_millis(),
        }
    }
}

/// A record that may be completed at some point in time.
pub trait Timestamped {
    /// Completion time in epoch millis; `None` while still open.
    fn completed_at(&self) -> Option<i64>;
}

/// Completed records finished strictly before `cutoff`.
pub fn select_expired<T: Timestamped>(records: &[T], cutoff: i64) -> Vec<&T> {
    records
        .iter()
        .filter(|r| r.completed_at().is_some_and(|at| at < cutoff))
        .collect()
}
