//! Remote write path and pending-log replay.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::storage::traits::{ProfileDocument, WriteMode};

use super::{DeferReason, SettingsSynchronizer, SweepReport, SyncOutcome};

impl SettingsSynchronizer {
    /// Replay pending writes after an offline→online transition.
    ///
    /// Entries are replayed newest-per-key in the order they were written. The
    /// first failure stops the sweep; what is left stays pending until the
    /// next transition or foreground.
    pub async fn on_connectivity_restored(&self) -> SweepReport {
        let Some(_guard) = self.pending.begin_replay() else {
            debug!("Replay already in progress, skipping");
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        };

        let plan = self.pending.replay_plan();
        if plan.is_empty() {
            return SweepReport::default();
        }

        info!(entries = plan.len(), "Replaying pending preference writes");

        let mut replayed = 0;
        for entry in &plan {
            if !self.connectivity.is_effectively_online() {
                warn!(key = %entry.key, "Connectivity lost during replay, stopping");
                break;
            }
            match self
                .push_remote(&entry.key, entry.seq, entry.value.clone(), "replay")
                .await
            {
                SyncOutcome::Synced | SyncOutcome::Superseded => replayed += 1,
                SyncOutcome::Deferred(_) => break,
            }
        }

        let remaining = self.pending.replay_plan().len();
        crate::metrics::record_sweep(replayed, remaining == 0);
        info!(replayed, remaining, "Replay finished");

        SweepReport {
            attempted: plan.len(),
            replayed,
            remaining,
            skipped: false,
        }
    }

    /// App came to the foreground: replay if online. `None` when offline.
    pub async fn on_foreground(&self) -> Option<SweepReport> {
        if !self.connectivity.is_effectively_online() {
            return None;
        }
        Some(self.on_connectivity_restored().await)
    }

    /// Merge-write one field to the remote profile and acknowledge `seq` on success.
    pub(super) async fn push_remote(
        &self,
        key: &str,
        seq: u64,
        value: Value,
        origin: &'static str,
    ) -> SyncOutcome {
        let _lock = self.remote_write_lock.lock().await;

        // A newer local write owns the sync for this key; ours must not land after it
        if self.pending.issued_seq(key).is_some_and(|newest| newest > seq) {
            debug!(key, seq, "Remote write superseded by newer local write");
            self.pending.acknowledge(key, seq);
            self.persist_pending().await;
            crate::metrics::record_remote_write(origin, "superseded");
            return SyncOutcome::Superseded;
        }

        let mut fields = ProfileDocument::new();
        fields.insert(key.to_string(), value);

        match self
            .remote
            .write(self.session.user_id(), fields, WriteMode::Merge)
            .await
        {
            Ok(()) => {
                self.remote_health.record_success();
                self.pending.acknowledge(key, seq);
                self.persist_pending().await;
                crate::metrics::record_remote_write(origin, "success");
                debug!(key, seq, origin, "Remote profile updated");
                SyncOutcome::Synced
            }
            Err(e) => {
                warn!(key, seq, origin, error = %e, "Remote write failed, keeping change pending");
                self.remote_health.record_failure();
                crate::metrics::record_remote_write(origin, "error");
                SyncOutcome::Deferred(DeferReason::RemoteFailed)
            }
        }
    }
}
