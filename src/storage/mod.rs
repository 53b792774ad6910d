//! Storage boundaries and reference backends.

pub mod traits;
pub mod memory;
pub mod sql;

pub use traits::{LocalStore, ProfileDocument, RemoteProfileStore, StorageError, WriteMode};
pub use memory::{InMemoryLocalStore, InMemoryRemoteStore};
pub use sql::SqliteLocalStore;
