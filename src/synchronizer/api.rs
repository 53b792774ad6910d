//! Preference read/write API.
//!
//! - `set_preference()` / `set()` - local-first write, remote write-through when online
//! - `load_preference()` / `load()` - cache first, remote refresh when nothing is pending
//! - `cached_preference()` - local-only read for immediate UI initialization
//!
//! Storage failures never surface here: local failures are logged, remote
//! failures turn into pending state.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::metrics::LatencyTimer;
use crate::preference::{validate_key, Preference};

use super::{
    ChangeOrigin, DeferReason, LoadSource, LoadedPreference, SettingsSynchronizer, SyncError,
    SyncOutcome, SyncState,
};

impl SettingsSynchronizer {
    /// Write a preference.
    ///
    /// The local write happens unconditionally and the change is recorded as
    /// pending. If effectively online the remote is updated with a merge write
    /// and the pending entry acknowledged on success. A failed or skipped
    /// remote write is reported as [`SyncOutcome::Deferred`], not as an error.
    #[instrument(skip(self, value))]
    pub async fn set_preference(&self, key: &str, value: Value) -> Result<SyncOutcome, SyncError> {
        self.check_key(key)?;
        let _timer = LatencyTimer::new("set");

        let seq = {
            let _order = self.local_write_lock.lock().await;
            self.write_local(key, &value).await;
            self.pending.record(key, value.clone())
        };
        self.persist_pending().await;
        self.publish(key, value.clone(), ChangeOrigin::Local);

        if !self.connectivity.is_effectively_online() {
            debug!(key, seq, "Offline, remote write deferred");
            crate::metrics::record_remote_write("write", "skipped");
            return Ok(SyncOutcome::Deferred(DeferReason::Offline));
        }

        Ok(self.push_remote(key, seq, value, "write").await)
    }

    /// Write a typed preference.
    pub async fn set<P: Preference>(&self, pref: &P) -> Result<SyncOutcome, SyncError> {
        let value = serde_json::to_value(pref)?;
        self.set_preference(P::KEY, value).await
    }

    /// Read a preference.
    ///
    /// The local cache is always read. The remote is consulted only when
    /// effectively online and no local write for the key is pending; a remote
    /// value then replaces the cached one. Any remote failure falls back to
    /// the cache silently.
    #[instrument(skip(self))]
    pub async fn load_preference(&self, key: &str) -> Result<LoadedPreference, SyncError> {
        self.check_key(key)?;
        let _timer = LatencyTimer::new("load");

        let cached = self.read_local(key).await;

        if self.pending.has_pending(key) {
            debug!(key, "Local write pending, remote read skipped");
            return Ok(self.from_cache(key, cached));
        }
        if !self.connectivity.is_effectively_online() {
            return Ok(self.from_cache(key, cached));
        }

        let issued_before = self.pending.issued_seq(key);
        match self.remote.read_field(self.session.user_id(), key).await {
            Ok(Some(remote_value)) => {
                self.remote_health.record_success();
                crate::metrics::record_remote_read("success");

                let _order = self.local_write_lock.lock().await;

                // A local write landed while the read was in flight
                if self.pending.has_pending(key) || self.pending.issued_seq(key) != issued_before {
                    debug!(key, "Local write raced remote read, keeping local value");
                    let current = self.read_local(key).await;
                    return Ok(self.from_cache(key, current));
                }

                if cached.as_ref() != Some(&remote_value) {
                    self.write_local(key, &remote_value).await;
                    self.publish(key, remote_value.clone(), ChangeOrigin::Remote);
                    debug!(key, "Local cache refreshed from remote");
                }

                Ok(LoadedPreference {
                    key: key.to_string(),
                    value: Some(remote_value),
                    source: LoadSource::Remote,
                    state: SyncState::Synced,
                })
            }
            Ok(None) => {
                self.remote_health.record_success();
                crate::metrics::record_remote_read("empty");
                Ok(self.from_cache(key, cached))
            }
            Err(e) => {
                debug!(key, error = %e, "Remote read failed, using cached value");
                self.remote_health.record_failure();
                crate::metrics::record_remote_read("error");
                Ok(self.from_cache(key, cached))
            }
        }
    }

    /// Read a typed preference. `None` when never set.
    pub async fn load<P: Preference>(&self) -> Result<Option<P>, SyncError> {
        let loaded = self.load_preference(P::KEY).await?;
        match loaded.value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Local-only read; never touches the network.
    pub async fn cached_preference(&self, key: &str) -> Result<Option<Value>, SyncError> {
        self.check_key(key)?;
        Ok(self.read_local(key).await)
    }

    fn check_key(&self, key: &str) -> Result<(), SyncError> {
        validate_key(key)?;
        if self.config.collides_with_pending_log(key) {
            return Err(SyncError::InvalidKey {
                key: key.to_string(),
                reason: "maps onto the pending log key",
            });
        }
        Ok(())
    }

    fn from_cache(&self, key: &str, value: Option<Value>) -> LoadedPreference {
        LoadedPreference {
            key: key.to_string(),
            value,
            source: LoadSource::Cache,
            state: self.sync_state(key),
        }
    }

    pub(super) async fn read_local(&self, key: &str) -> Option<Value> {
        let local_key = self.config.local_key(key);
        match self.local.get(&local_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Cached preference is not valid JSON, ignoring");
                    crate::metrics::record_local_error("decode");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Local preference read failed");
                crate::metrics::record_local_error("get");
                None
            }
        }
    }

    /// Returns whether the write succeeded; failures are only logged.
    pub(super) async fn write_local(&self, key: &str, value: &Value) -> bool {
        let local_key = self.config.local_key(key);
        match self.local.set(&local_key, &value.to_string()).await {
            Ok(()) => {
                crate::metrics::record_local_write("success");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Local preference write failed, continuing");
                crate::metrics::record_local_write("error");
                false
            }
        }
    }

    pub(super) async fn persist_pending(&self) {
        if let Err(e) = self.pending.persist(self.local.as_ref()).await {
            warn!(error = %e, "Failed to persist pending log");
            crate::metrics::record_local_error("persist");
        }
    }
}
