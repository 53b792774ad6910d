//! Public types for the settings synchronizer.

use serde_json::Value;
use thiserror::Error;

use crate::resilience::PendingStats;

/// Synchronizer lifecycle state.
///
/// Use [`super::SettingsSynchronizer::state()`] to check the current state or
/// [`super::SettingsSynchronizer::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronizerState {
    /// Just created, pending log not yet restored
    Created,
    /// Restoring the pending log from the local store
    Restoring,
    /// Ready to accept reads and writes
    Ready,
    /// Reconnect loop running
    Running,
    /// Graceful shutdown in progress
    ShuttingDown,
    /// Shut down, pending log persisted
    Stopped,
}

impl std::fmt::Display for SynchronizerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Restoring => write!(f, "Restoring"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Per-key reconciliation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No unconfirmed local write
    Synced,
    /// Local value is ahead of the remote copy
    PendingLocal,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synced => write!(f, "Synced"),
            Self::PendingLocal => write!(f, "PendingLocal"),
        }
    }
}

/// Why a remote write did not happen (yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// Not effectively online; the remote was not contacted
    Offline,
    /// The remote rejected or failed the write
    RemoteFailed,
}

/// Result of a preference write. The local write is never reported as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote confirmed the write
    Synced,
    /// Kept pending until the next reconnect or foreground sweep
    Deferred(DeferReason),
    /// A newer local write for the same key arrived first and carries the sync
    Superseded,
}

impl SyncOutcome {
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

/// Where a loaded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Local cache; the remote was skipped, empty, or unreachable
    Cache,
    /// Fresh remote value, now also cached locally
    Remote,
}

/// Result of [`super::SettingsSynchronizer::load_preference()`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPreference {
    pub key: String,
    pub value: Option<Value>,
    pub source: LoadSource,
    pub state: SyncState,
}

/// Who caused a preference change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written on this device
    Local,
    /// Pulled from the remote profile
    Remote,
}

impl ChangeOrigin {
    pub(crate) fn as_label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceChange {
    pub key: String,
    pub value: Value,
    pub origin: ChangeOrigin,
}

/// Result of a pending-log replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Keys in the replay plan
    pub attempted: usize,
    /// Keys confirmed by the remote (or superseded by a newer write)
    pub replayed: usize,
    /// Keys still pending afterwards
    pub remaining: usize,
    /// Another sweep was already running
    pub skipped: bool,
}

impl SweepReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.skipped && self.remaining == 0
    }
}

/// Snapshot for observability.
#[derive(Debug, Clone, Copy)]
pub struct SyncStats {
    pub state: SynchronizerState,
    pub pending: PendingStats,
    pub effective_online: bool,
    pub remote_healthy: bool,
    pub remote_failures: u64,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid preference key '{key}': {reason}")]
    InvalidKey {
        key: String,
        reason: &'static str,
    },
    #[error("Preference value could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Synchronizer already started (state {0})")]
    AlreadyStarted(SynchronizerState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SynchronizerState::Created.to_string(), "Created");
        assert_eq!(SynchronizerState::Running.to_string(), "Running");
        assert_eq!(SyncState::PendingLocal.to_string(), "PendingLocal");
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(SyncOutcome::Synced.is_synced());
        assert!(SyncOutcome::Deferred(DeferReason::Offline).is_deferred());
        assert!(!SyncOutcome::Superseded.is_synced());
        assert!(!SyncOutcome::Superseded.is_deferred());
    }

    #[test]
    fn test_sweep_report_completeness() {
        let done = SweepReport { attempted: 2, replayed: 2, remaining: 0, skipped: false };
        assert!(done.is_complete());
        let partial = SweepReport { attempted: 2, replayed: 1, remaining: 1, skipped: false };
        assert!(!partial.is_complete());
        let skipped = SweepReport { skipped: true, ..SweepReport::default() };
        assert!(!skipped.is_complete());
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::InvalidKey { key: "".into(), reason: "empty" };
        assert_eq!(err.to_string(), "Invalid preference key '': empty");
        let err = SyncError::AlreadyStarted(SynchronizerState::Running);
        assert!(err.to_string().contains("Running"));
    }
}
