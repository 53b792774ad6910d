//! Pending-sync log for preference writes the remote has not confirmed.
//!
//! Every local write records an entry here before the remote write is
//! attempted; a confirmed remote write acknowledges it. Whatever is left is
//! replayed on the next reconnect. The log is persisted as one JSON document
//! in the local store, so unsynced changes survive a restart. An absent
//! document means nothing is pending.
//!
//! This is NOT a history. Only the newest entry per key matters for replay;
//! older ones are kept until acknowledged so the log can be audited and
//! compacted when it grows past its bound.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::preference::now_millis;
use crate::storage::traits::{LocalStore, StorageError};

/// One unsynced local write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Monotonic sequence number, unique within the log
    pub seq: u64,
    pub key: String,
    pub value: Value,
    /// When the entry was recorded (epoch millis)
    pub recorded_at: i64,
}

/// Pending log state for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStats {
    /// Entries currently in the log
    pub pending_entries: u64,
    /// Distinct keys with at least one entry
    pub pending_keys: u64,
    /// Entries recorded since startup
    pub total_recorded: u64,
    /// Entries acknowledged since startup
    pub total_acknowledged: u64,
    /// Times the log was compacted to one entry per key
    pub compactions: u64,
    /// Whether a replay is in progress
    pub replaying: bool,
}

#[derive(Default)]
struct LogState {
    entries: Vec<PendingEntry>,
    /// Newest seq handed out per key, acknowledged or not
    issued: HashMap<String, u64>,
    next_seq: u64,
}

/// Append-only pending log, persisted through a [`LocalStore`].
pub struct PendingLog {
    storage_key: String,
    state: Mutex<LogState>,
    /// Serializes snapshot+write so an older snapshot never lands after a newer one
    persist_lock: tokio::sync::Mutex<()>,
    max_entries: usize,
    total_recorded: AtomicU64,
    total_acknowledged: AtomicU64,
    compactions: AtomicU64,
    replaying: AtomicBool,
}

impl PendingLog {
    pub fn new(storage_key: impl Into<String>, max_entries: usize) -> Self {
        Self {
            storage_key: storage_key.into(),
            state: Mutex::new(LogState {
                next_seq: 1,
                ..LogState::default()
            }),
            persist_lock: tokio::sync::Mutex::new(()),
            max_entries: max_entries.max(1),
            total_recorded: AtomicU64::new(0),
            total_acknowledged: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            replaying: AtomicBool::new(false),
        }
    }

    /// Key under which the log is persisted.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Load entries persisted by a previous run. Unreadable state is logged
    /// and treated as empty. Returns the number of restored entries.
    pub async fn restore(&self, local: &dyn LocalStore) -> usize {
        let raw = match local.get(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, "Failed to read pending log, starting empty");
                crate::metrics::record_local_error("restore");
                return 0;
            }
        };

        let mut entries: Vec<PendingEntry> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Pending log is corrupt, discarding");
                crate::metrics::record_local_error("restore");
                return 0;
            }
        };
        entries.sort_by_key(|e| e.seq);

        let mut state = self.state.lock();
        for entry in &entries {
            let issued = state.issued.entry(entry.key.clone()).or_insert(0);
            *issued = (*issued).max(entry.seq);
            state.next_seq = state.next_seq.max(entry.seq + 1);
        }
        let count = entries.len();
        state.entries = entries;
        drop(state);

        if count > 0 {
            warn!(pending = count, "Pending log has entries from previous run, will replay");
        }
        crate::metrics::set_pending_entries(count);
        count
    }

    /// Record a local write. Returns its sequence number.
    pub fn record(&self, key: &str, value: Value) -> u64 {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.issued.insert(key.to_string(), seq);
        state.entries.push(PendingEntry {
            seq,
            key: key.to_string(),
            value,
            recorded_at: now_millis(),
        });

        if state.entries.len() > self.max_entries {
            let before = state.entries.len();
            let compacted = latest_per_key(&state.entries);
            state.entries = compacted;
            self.compactions.fetch_add(1, Ordering::Relaxed);
            info!(before, after = state.entries.len(), "Pending log compacted");
        }
        let len = state.entries.len();
        drop(state);

        self.total_recorded.fetch_add(1, Ordering::Relaxed);
        crate::metrics::set_pending_entries(len);
        debug!(key, seq, pending = len, "Pending entry recorded");
        seq
    }

    /// Drop every entry for `key` up to and including `seq`. Returns how many were removed.
    pub fn acknowledge(&self, key: &str, seq: u64) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| !(e.key == key && e.seq <= seq));
        let removed = before - state.entries.len();
        let len = state.entries.len();
        drop(state);

        if removed > 0 {
            self.total_acknowledged.fetch_add(removed as u64, Ordering::Relaxed);
            crate::metrics::set_pending_entries(len);
            debug!(key, seq, removed, "Pending entries acknowledged");
        }
        removed
    }

    /// The pending-sync flag for `key`.
    #[must_use]
    pub fn has_pending(&self, key: &str) -> bool {
        self.state.lock().entries.iter().any(|e| e.key == key)
    }

    /// Newest seq issued for `key`, acknowledged or not.
    #[must_use]
    pub fn issued_seq(&self, key: &str) -> Option<u64> {
        self.state.lock().issued.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Newest entry per key, ordered by seq.
    #[must_use]
    pub fn replay_plan(&self) -> Vec<PendingEntry> {
        latest_per_key(&self.state.lock().entries)
    }

    /// Write the current log to the local store, or remove it when empty.
    pub async fn persist(&self, local: &dyn LocalStore) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;

        let snapshot = self.state.lock().entries.clone();
        if snapshot.is_empty() {
            return local.remove(&self.storage_key).await;
        }

        let raw = serde_json::to_string(&snapshot).map_err(|e| StorageError::Corrupt {
            key: self.storage_key.clone(),
            reason: e.to_string(),
        })?;
        local.set(&self.storage_key, &raw).await
    }

    /// Mark a replay as running. `None` if one is already in progress.
    pub fn begin_replay(&self) -> Option<ReplayGuard<'_>> {
        if self.replaying.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ReplayGuard(&self.replaying))
    }

    #[must_use]
    pub fn stats(&self) -> PendingStats {
        let state = self.state.lock();
        let mut keys: Vec<&str> = state.entries.iter().map(|e| e.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        PendingStats {
            pending_entries: state.entries.len() as u64,
            pending_keys: keys.len() as u64,
            total_recorded: self.total_recorded.load(Ordering::Relaxed),
            total_acknowledged: self.total_acknowledged.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            replaying: self.replaying.load(Ordering::Acquire),
        }
    }
}

fn latest_per_key(entries: &[PendingEntry]) -> Vec<PendingEntry> {
    let mut newest: HashMap<&str, &PendingEntry> = HashMap::new();
    for entry in entries {
        let newer = newest
            .get(entry.key.as_str())
            .map_or(true, |existing| existing.seq < entry.seq);
        if newer {
            newest.insert(entry.key.as_str(), entry);
        }
    }
    let mut plan: Vec<PendingEntry> = newest.into_values().cloned().collect();
    plan.sort_by_key(|e| e.seq);
    plan
}

/// RAII guard that clears the replaying flag.
pub struct ReplayGuard<'a>(&'a AtomicBool);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tracks consecutive remote failures.
///
/// Observability only: writes are gated on connectivity, not on this.
pub struct RemoteHealth {
    healthy: AtomicBool,
    failures: AtomicU64,
    threshold: u64,
    /// Epoch millis of the last confirmed remote operation (0 = never)
    last_success_at: AtomicU64,
}

impl RemoteHealth {
    pub fn new(threshold: u64) -> Self {
        Self {
            healthy: AtomicBool::new(true),
            failures: AtomicU64::new(0),
            threshold: threshold.max(1),
            last_success_at: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        self.last_success_at
            .store(now_millis().max(0) as u64, Ordering::Release);
        if !self.healthy.swap(true, Ordering::AcqRel) {
            info!("Remote profile store reachable again");
            crate::metrics::set_remote_healthy(true);
        }
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.threshold && self.healthy.swap(false, Ordering::AcqRel) {
            warn!(failures, "Remote profile store marked degraded");
            crate::metrics::set_remote_healthy(false);
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    /// Epoch millis of the last success, if any.
    #[must_use]
    pub fn last_success_at(&self) -> Option<u64> {
        match self.last_success_at.load(Ordering::Acquire) {
            0 => None,
            at => Some(at),
        }
    }
}

impl Default for RemoteHealth {
    fn default() -> Self {
        Self::new(3)
    }
}
