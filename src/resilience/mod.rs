//! Durability and failure handling: pending log, remote health, local retry.

pub mod pending_log;
pub mod retry;

pub use pending_log::{PendingEntry, PendingLog, PendingStats, RemoteHealth};
pub use retry::RetryConfig;
