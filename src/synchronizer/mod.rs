// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Settings synchronizer.
//!
//! The [`SettingsSynchronizer`] keeps named preferences consistent between the
//! device-local store and the user's remote profile document under
//! intermittent connectivity:
//! - every write lands locally first and is recorded in the pending log
//! - when effectively online the write goes through to the remote (merge)
//! - a confirmed remote write acknowledges the pending entry
//! - an offline→online edge (or app foreground) replays what is left
//! - reads trust the remote only while nothing is pending for the key
//!
//! Conflicts resolve as last writer wins at the remote.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Restoring → Ready → Running → ShuttingDown → Stopped
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use settings_sync::{ConnectivityMonitor, Session, SettingsSynchronizer, SyncConfig};
//! use settings_sync::preference::FontSize;
//! use settings_sync::storage::{InMemoryLocalStore, InMemoryRemoteStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sync = Arc::new(SettingsSynchronizer::new(
//!     SyncConfig::default(),
//!     Session::new("user-1"),
//!     Arc::new(InMemoryLocalStore::new()),
//!     Arc::new(InMemoryRemoteStore::new()),
//!     ConnectivityMonitor::online(),
//! ));
//! sync.start().await?;
//! tokio::spawn({
//!     let sync = sync.clone();
//!     async move { sync.run().await }
//! });
//!
//! sync.set(&FontSize::Large).await?;
//! assert_eq!(sync.load::<FontSize>().await?, Some(FontSize::Large));
//!
//! sync.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod types;
mod api;
mod lifecycle;
mod sweep;

pub use types::{
    ChangeOrigin, DeferReason, LoadSource, LoadedPreference, PreferenceChange, SweepReport,
    SyncError, SyncOutcome, SyncState, SyncStats, SynchronizerState,
};

use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::warn;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::resilience::{PendingLog, RemoteHealth};
use crate::session::Session;
use crate::storage::traits::{LocalStore, RemoteProfileStore};

/// Offline-first preference synchronizer for one signed-in user.
///
/// All collaborators are injected; nothing is global. The synchronizer is
/// `Send + Sync` and is usually shared behind an `Arc` between UI handlers and
/// the reconnect loop.
pub struct SettingsSynchronizer {
    pub(super) config: SyncConfig,

    pub(super) session: Session,

    /// Device key-value cache (authoritative for the user's immediate view)
    pub(super) local: Arc<dyn LocalStore>,

    /// Remote profile document store
    pub(super) remote: Arc<dyn RemoteProfileStore>,

    pub(super) connectivity: ConnectivityMonitor,

    /// Unconfirmed local writes
    pub(super) pending: PendingLog,

    pub(super) remote_health: RemoteHealth,

    /// Keeps local cache order and pending seq order identical
    pub(super) local_write_lock: Mutex<()>,

    /// Serializes remote writes so they complete in issue order
    pub(super) remote_write_lock: Mutex<()>,

    /// Change feed for subscribers
    pub(super) changes: broadcast::Sender<PreferenceChange>,

    /// Lifecycle state (broadcast to watchers)
    pub(super) state: watch::Sender<SynchronizerState>,
}

impl SettingsSynchronizer {
    /// Create a synchronizer in `Created` state.
    ///
    /// Call [`start()`](Self::start) before use so unsynced writes from a
    /// previous run are restored.
    pub fn new(
        config: SyncConfig,
        session: Session,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteProfileStore>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        if config.start_forced_offline {
            connectivity.set_forced_offline(true);
        }

        let (state_tx, _state_rx) = watch::channel(SynchronizerState::Created);
        crate::metrics::set_synchronizer_state(None, &SynchronizerState::Created.to_string());
        let (changes, _changes_rx) = broadcast::channel(config.change_channel_capacity.max(1));
        let pending = PendingLog::new(config.pending_log_key.clone(), config.pending_max_entries);
        let remote_health = RemoteHealth::new(config.health_failure_threshold);

        Self {
            config,
            session,
            local,
            remote,
            connectivity,
            pending,
            remote_health,
            local_write_lock: Mutex::new(()),
            remote_write_lock: Mutex::new(()),
            changes,
            state: state_tx,
        }
    }

    /// Get current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SynchronizerState {
        *self.state.borrow()
    }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SynchronizerState> {
        self.state.subscribe()
    }

    pub(super) fn set_state(&self, next: SynchronizerState) {
        let previous = self.state.send_replace(next);
        crate::metrics::set_synchronizer_state(Some(&previous.to_string()), &next.to_string());
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Reconciliation state of `key`.
    #[must_use]
    pub fn sync_state(&self, key: &str) -> SyncState {
        if self.pending.has_pending(key) {
            SyncState::PendingLocal
        } else {
            SyncState::Synced
        }
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            state: self.state(),
            pending: self.pending.stats(),
            effective_online: self.connectivity.is_effectively_online(),
            remote_healthy: self.remote_health.is_healthy(),
            remote_failures: self.remote_health.failure_count(),
        }
    }

    /// Subscribe to preference changes. Dropping the subscription unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> PreferenceSubscription {
        PreferenceSubscription {
            rx: self.changes.subscribe(),
            key: None,
        }
    }

    pub(super) fn publish(&self, key: &str, value: serde_json::Value, origin: ChangeOrigin) {
        crate::metrics::record_preference_change(origin.as_label());
        // No subscribers is fine
        let _ = self.changes.send(PreferenceChange {
            key: key.to_string(),
            value,
            origin,
        });
    }
}

/// Stream of [`PreferenceChange`]s, optionally filtered to one key.
pub struct PreferenceSubscription {
    rx: broadcast::Receiver<PreferenceChange>,
    key: Option<String>,
}

impl PreferenceSubscription {
    /// Only deliver changes for `key`.
    #[must_use]
    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn wants(&self, change: &PreferenceChange) -> bool {
        self.key.as_deref().map_or(true, |k| k == change.key)
    }

    /// Wait for the next matching change. `None` once the synchronizer is gone.
    pub async fn next(&mut self) -> Option<PreferenceChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.wants(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Preference subscriber lagged, some changes were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching change if one is already queued.
    pub fn try_next(&mut self) -> Option<PreferenceChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.wants(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Preference subscriber lagged, some changes were dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryLocalStore, InMemoryRemoteStore};
    use serde_json::json;

    fn synchronizer() -> SettingsSynchronizer {
        SettingsSynchronizer::new(
            SyncConfig::default(),
            Session::new("u"),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::new()),
            ConnectivityMonitor::offline(),
        )
    }

    #[test]
    fn test_new_is_created_and_idle() {
        let sync = synchronizer();
        assert_eq!(sync.state(), SynchronizerState::Created);
        assert_eq!(sync.sync_state("theme"), SyncState::Synced);
        assert!(!sync.stats().effective_online);
    }

    #[test]
    fn test_start_forced_offline_flips_monitor() {
        let connectivity = ConnectivityMonitor::online();
        let _sync = SettingsSynchronizer::new(
            SyncConfig { start_forced_offline: true, ..SyncConfig::default() },
            Session::new("u"),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::new()),
            connectivity.clone(),
        );
        assert!(connectivity.status().forced_offline);
        assert!(!connectivity.is_effectively_online());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let sync = synchronizer();
        sync.publish("theme", json!("dark"), ChangeOrigin::Local);
    }

    #[test]
    fn test_subscription_for_key_filters() {
        let sync = synchronizer();
        let mut all = sync.subscribe();
        let mut theme_only = sync.subscribe().for_key("theme");

        sync.publish("font_size", json!("large"), ChangeOrigin::Local);
        sync.publish("theme", json!("dark"), ChangeOrigin::Remote);

        let first = all.try_next().unwrap();
        assert_eq!(first.key, "font_size");
        assert_eq!(all.try_next().unwrap().key, "theme");
        assert!(all.try_next().is_none());

        let change = theme_only.try_next().unwrap();
        assert_eq!(change.key, "theme");
        assert_eq!(change.value, json!("dark"));
        assert_eq!(change.origin, ChangeOrigin::Remote);
        assert!(theme_only.try_next().is_none());
    }

    #[tokio::test]
    async fn test_subscription_ends_with_synchronizer() {
        let sync = synchronizer();
        let mut sub = sync.subscribe();
        drop(sync);
        assert!(sub.next().await.is_none());
    }
}
