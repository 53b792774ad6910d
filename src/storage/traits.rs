// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage boundaries consumed by the synchronizer.
//!
//! Both stores are opaque collaborators: the device key-value cache and the
//! remote per-user profile document. Implementations live outside this crate
//! in production; [`super::memory`] and [`super::sql`] are reference backends.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::session::UserId;

/// A remote profile document: a flat JSON object keyed by field name.
pub type ProfileDocument = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Item not found")]
    NotFound,
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt value for '{key}': {reason}")]
    Corrupt {
        key: String,
        reason: String,
    },
}

/// How a remote write treats fields the caller did not mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Only the given fields are touched; everything else is kept.
    #[default]
    Merge,
    /// The document becomes exactly the given fields.
    Replace,
}

/// Device-local string key-value store. Survives restarts (for durable backends),
/// no transactions, no schema.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Remote per-user profile document store.
#[async_trait]
pub trait RemoteProfileStore: Send + Sync {
    /// Point read of the whole profile. `Ok(None)` means the document does not exist.
    async fn read(&self, user: &UserId) -> Result<Option<ProfileDocument>, StorageError>;

    /// Write `fields` into the user's profile.
    async fn write(
        &self,
        user: &UserId,
        fields: ProfileDocument,
        mode: WriteMode,
    ) -> Result<(), StorageError>;

    /// Read a single field. Default implementation reads the whole document.
    async fn read_field(&self, user: &UserId, field: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .read(user)
            .await?
            .and_then(|mut doc| doc.remove(field)))
    }
}
