//! In-memory reference backends for both storage boundaries.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::traits::{LocalStore, ProfileDocument, RemoteProfileStore, StorageError, WriteMode};
use crate::session::UserId;

/// Process-lifetime key-value store.
pub struct InMemoryLocalStore {
    data: DashMap<String, String>,
}

impl InMemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }
}

/// Remote profile documents held in memory.
///
/// The outage switch makes every call fail with [`StorageError::Unavailable`],
/// which is how tests simulate the backend rejecting writes while the device
/// still believes it is online.
pub struct InMemoryRemoteStore {
    docs: DashMap<UserId, ProfileDocument>,
    outage: AtomicBool,
    writes: AtomicU64,
    reads: AtomicU64,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
            outage: AtomicBool::new(false),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Toggle the simulated outage.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Successful reads so far.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Peek at a field without going through the trait (no counters, no outage).
    #[must_use]
    pub fn field(&self, user: &UserId, field: &str) -> Option<Value> {
        self.docs.get(user).and_then(|doc| doc.get(field).cloned())
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.outage.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("remote profile store is down".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteProfileStore for InMemoryRemoteStore {
    async fn read(&self, user: &UserId) -> Result<Option<ProfileDocument>, StorageError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.get(user).map(|doc| doc.value().clone()))
    }

    async fn write(
        &self,
        user: &UserId,
        fields: ProfileDocument,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        match mode {
            WriteMode::Merge => {
                let mut doc = self.docs.entry(user.clone()).or_default();
                for (field, value) in fields {
                    doc.insert(field, value);
                }
            }
            WriteMode::Replace => {
                self.docs.insert(user.clone(), fields);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
