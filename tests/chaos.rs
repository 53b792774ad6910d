//! Chaos Testing for the settings synchronizer
//!
//! Failure scenarios using:
//! 1. **Failing store wrappers** - precise error injection at specific call counts
//! 2. **Data corruption** - garbage in the local store
//! 3. **Concurrent writers** - overlapping writes to one key plus a replay
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use settings_sync::preference::{FontSize, Preference};
use settings_sync::storage::{
    InMemoryLocalStore, InMemoryRemoteStore, LocalStore, ProfileDocument, RemoteProfileStore,
    StorageError, WriteMode,
};
use settings_sync::{
    ConnectivityMonitor, Reachability, Session, SettingsSynchronizer, SyncConfig, SyncOutcome,
    SyncState, UserId,
};

// =============================================================================
// Failing Store Wrappers - Precise Error Injection
// =============================================================================

/// Call counter that decides which calls fail.
struct FailurePlan {
    call_count: AtomicU64,
    /// Fail on these call numbers (1-indexed)
    fail_on_calls: Vec<u64>,
    /// Fail every call from `fail_on_calls[0]` onwards
    fail_permanently: AtomicBool,
    error_msg: String,
}

impl FailurePlan {
    fn new(fail_on_calls: Vec<u64>, error_msg: &str) -> Self {
        Self {
            call_count: AtomicU64::new(0),
            fail_on_calls,
            fail_permanently: AtomicBool::new(false),
            error_msg: error_msg.to_string(),
        }
    }

    fn always(error_msg: &str) -> Self {
        let plan = Self::new(vec![1], error_msg);
        plan.fail_permanently.store(true, Ordering::SeqCst);
        plan
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = if self.fail_permanently.load(Ordering::SeqCst) {
            self.fail_on_calls.first().is_some_and(|first| count >= *first)
        } else {
            self.fail_on_calls.contains(&count)
        };
        if fail {
            Err(StorageError::Backend(self.error_msg.clone()))
        } else {
            Ok(())
        }
    }
}

/// Local store whose `set` calls fail per plan. Reads and removes pass through.
struct FailingLocalStore {
    inner: InMemoryLocalStore,
    sets: FailurePlan,
}

#[async_trait]
impl LocalStore for FailingLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.sets.maybe_fail()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

/// Remote store whose `write` calls fail per plan.
struct FailingRemoteStore {
    inner: Arc<InMemoryRemoteStore>,
    writes: FailurePlan,
}

#[async_trait]
impl RemoteProfileStore for FailingRemoteStore {
    async fn read(&self, user: &UserId) -> Result<Option<ProfileDocument>, StorageError> {
        self.inner.read(user).await
    }

    async fn write(
        &self,
        user: &UserId,
        fields: ProfileDocument,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        self.writes.maybe_fail()?;
        self.inner.write(user, fields, mode).await
    }
}

fn user() -> UserId {
    UserId::new("user-1")
}

fn synchronizer(
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteProfileStore>,
    connectivity: ConnectivityMonitor,
) -> SettingsSynchronizer {
    SettingsSynchronizer::new(
        SyncConfig::default(),
        Session::new("user-1"),
        local,
        remote,
        connectivity,
    )
}

// =============================================================================
// Local store failures
// =============================================================================

#[tokio::test]
async fn chaos_local_write_failure_is_swallowed() {
    let local = Arc::new(FailingLocalStore {
        inner: InMemoryLocalStore::new(),
        sets: FailurePlan::always("disk full"),
    });
    let remote = Arc::new(InMemoryRemoteStore::new());
    let sync = synchronizer(local.clone(), remote.clone(), ConnectivityMonitor::online());
    sync.start().await.unwrap();

    let outcome = sync.set(&FontSize::Large).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Synced);
    assert_eq!(remote.field(&user(), "font_size"), Some(json!("large")));
    assert_eq!(sync.cached_preference("font_size").await.unwrap(), None);
}

#[tokio::test]
async fn chaos_pending_log_persist_failure_keeps_memory_state() {
    // Call 1 is the value write, call 2 the pending log persist
    let local = Arc::new(FailingLocalStore {
        inner: InMemoryLocalStore::new(),
        sets: FailurePlan::new(vec![2], "io error"),
    });
    let sync = synchronizer(
        local.clone(),
        Arc::new(InMemoryRemoteStore::new()),
        ConnectivityMonitor::offline(),
    );
    sync.start().await.unwrap();

    let outcome = sync.set(&FontSize::Small).await.unwrap();

    assert!(outcome.is_deferred());
    assert_eq!(sync.sync_state("font_size"), SyncState::PendingLocal);
    assert!(local.inner.get("sync:pending").await.unwrap().is_none());

    // Next successful persist catches up
    sync.shutdown().await;
    assert!(local.inner.get("sync:pending").await.unwrap().is_some());
}

// =============================================================================
// Remote failures
// =============================================================================

#[tokio::test]
async fn chaos_remote_failure_mid_replay_stops_sweep() {
    let store = Arc::new(InMemoryRemoteStore::new());
    let remote = Arc::new(FailingRemoteStore {
        inner: store.clone(),
        writes: FailurePlan::new(vec![2], "503 service unavailable"),
    });
    let connectivity = ConnectivityMonitor::offline();
    let sync = synchronizer(Arc::new(InMemoryLocalStore::new()), remote, connectivity.clone());
    sync.start().await.unwrap();

    sync.set_preference("a", json!(1)).await.unwrap();
    sync.set_preference("b", json!(2)).await.unwrap();
    sync.set_preference("c", json!(3)).await.unwrap();

    connectivity.report(Reachability { reachable: true });
    let report = sync.on_connectivity_restored().await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.replayed, 1);
    assert_eq!(report.remaining, 2);
    assert_eq!(store.field(&user(), "a"), Some(json!(1)));
    assert_eq!(store.field(&user(), "b"), None);
    assert_eq!(store.field(&user(), "c"), None);
    assert_eq!(sync.sync_state("b"), SyncState::PendingLocal);

    let report = sync.on_connectivity_restored().await;
    assert!(report.is_complete());
    assert_eq!(store.field(&user(), "c"), Some(json!(3)));
}

#[tokio::test]
async fn chaos_remote_degraded_after_threshold() {
    let store = Arc::new(InMemoryRemoteStore::new());
    let remote = Arc::new(FailingRemoteStore {
        inner: store.clone(),
        writes: FailurePlan::always("connection reset"),
    });
    let sync = synchronizer(Arc::new(InMemoryLocalStore::new()), remote, ConnectivityMonitor::online());
    sync.start().await.unwrap();

    for i in 0..3 {
        let outcome = sync.set_preference("counter", json!(i)).await.unwrap();
        assert!(outcome.is_deferred());
    }

    let stats = sync.stats();
    assert!(!stats.remote_healthy);
    assert_eq!(stats.remote_failures, 3);
    assert_eq!(sync.cached_preference("counter").await.unwrap(), Some(json!(2)));
}

// =============================================================================
// Corruption
// =============================================================================

#[tokio::test]
async fn chaos_corrupt_pending_log_starts_empty() {
    let local = Arc::new(InMemoryLocalStore::new());
    local.set("sync:pending", "{not a log").await.unwrap();

    let sync = synchronizer(local, Arc::new(InMemoryRemoteStore::new()), ConnectivityMonitor::online());
    sync.start().await.unwrap();

    assert_eq!(sync.stats().pending.pending_entries, 0);
}

#[tokio::test]
async fn chaos_corrupt_cached_value_reads_as_missing() {
    let local = Arc::new(InMemoryLocalStore::new());
    local.set("pref:font_size", "{{garbage").await.unwrap();

    let sync = synchronizer(local, Arc::new(InMemoryRemoteStore::new()), ConnectivityMonitor::offline());
    sync.start().await.unwrap();

    let loaded = sync.load_preference("font_size").await.unwrap();
    assert_eq!(loaded.value, None);
}

#[tokio::test]
async fn chaos_typed_decode_failure_is_an_error() {
    let local = Arc::new(InMemoryLocalStore::new());
    local.set("pref:font_size", "\"gigantic\"").await.unwrap();

    let sync = synchronizer(local, Arc::new(InMemoryRemoteStore::new()), ConnectivityMonitor::offline());
    sync.start().await.unwrap();

    assert!(sync.load::<FontSize>().await.is_err());
    assert_eq!(FontSize::KEY, "font_size");
}

// =============================================================================
// Concurrent writers
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chaos_concurrent_writes_converge_on_last_local_value() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let sync = Arc::new(synchronizer(
        Arc::new(InMemoryLocalStore::new()),
        remote.clone(),
        ConnectivityMonitor::online(),
    ));
    sync.start().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let sync = sync.clone();
        handles.push(tokio::spawn(async move {
            sync.set_preference("volume", json!(i)).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let local: Option<Value> = sync.cached_preference("volume").await.unwrap();
    assert_eq!(sync.sync_state("volume"), SyncState::Synced);
    assert_eq!(remote.field(&user(), "volume"), local);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chaos_replay_racing_new_write_keeps_newest() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let connectivity = ConnectivityMonitor::offline();
    let sync = Arc::new(synchronizer(
        Arc::new(InMemoryLocalStore::new()),
        remote.clone(),
        connectivity.clone(),
    ));
    sync.start().await.unwrap();

    sync.set(&FontSize::Small).await.unwrap();
    connectivity.report(Reachability { reachable: true });

    let sweep = tokio::spawn({
        let sync = sync.clone();
        async move { sync.on_connectivity_restored().await }
    });
    sync.set(&FontSize::Large).await.unwrap();
    sweep.await.unwrap();

    assert_eq!(sync.sync_state("font_size"), SyncState::Synced);
    assert_eq!(remote.field(&user(), "font_size"), Some(json!("large")));
    assert_eq!(sync.load::<FontSize>().await.unwrap(), Some(FontSize::Large));
}
