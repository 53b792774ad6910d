//! # Settings Sync
//!
//! Offline-first synchronization of user preferences between a device-local
//! key-value cache and a remote per-user profile document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SettingsSynchronizer                      │
//! │  • set_preference(): local write, then remote write-through │
//! │  • load_preference(): cache first, remote when not pending  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     ▲
//!          ▼                    ▼                     │
//! ┌─────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │   LocalStore    │  │ RemoteProfile-   │  │ Connectivity-    │
//! │  values + the   │  │ Store (merge,    │  │ Monitor          │
//! │  pending log    │  │ last writer wins)│  │ offline→online   │
//! └─────────────────┘  └──────────────────┘  │ edge → replay    │
//!                                            └──────────────────┘
//! ```
//!
//! Unconfirmed writes are kept in a persisted [`resilience::PendingLog`] and
//! replayed in write order when connectivity returns or the app comes to the
//! foreground.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use settings_sync::{ConnectivityMonitor, Session, SettingsSynchronizer, SyncConfig};
//! use settings_sync::preference::FontSize;
//! use settings_sync::storage::{InMemoryRemoteStore, SqliteLocalStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let local = SqliteLocalStore::open("./settings.db").await?;
//!     let connectivity = ConnectivityMonitor::online();
//!
//!     let sync = Arc::new(SettingsSynchronizer::new(
//!         SyncConfig::default(),
//!         Session::new("user-42"),
//!         Arc::new(local),
//!         Arc::new(InMemoryRemoteStore::new()),
//!         connectivity.clone(),
//!     ));
//!     sync.start().await?;
//!     tokio::spawn({
//!         let sync = sync.clone();
//!         async move { sync.run().await }
//!     });
//!
//!     connectivity.set_forced_offline(true);
//!     sync.set(&FontSize::ExtraLarge).await?;   // stays pending
//!     connectivity.set_forced_offline(false);   // run() replays it
//!
//!     sync.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`synchronizer`]: the [`SettingsSynchronizer`] and its lifecycle
//! - [`storage`]: store boundaries plus in-memory and SQLite backends
//! - [`connectivity`]: effective-online state and transition edges
//! - [`resilience`]: pending log, remote health, retry
//! - [`notifications`]: reminder settings and scheduler boundary
//! - [`cleanup`]: completed-record retention policy

pub mod config;
pub mod session;
pub mod preference;
pub mod storage;
pub mod connectivity;
pub mod resilience;
pub mod synchronizer;
pub mod notifications;
pub mod cleanup;
pub mod metrics;

pub use config::SyncConfig;
pub use session::{Session, UserId};
pub use preference::{FontSize, Preference, PreferenceEntry};
pub use connectivity::{ConnectivityEdge, ConnectivityMonitor, ConnectivityStatus, Reachability};
pub use synchronizer::{
    LoadSource, LoadedPreference, PreferenceChange, PreferenceSubscription, SettingsSynchronizer,
    SweepReport, SyncError, SyncOutcome, SyncState, SynchronizerState,
};
pub use storage::traits::{LocalStore, RemoteProfileStore, StorageError};
pub use notifications::{NotificationPlanner, NotificationScheduler, NotificationSettings, ScheduleError};
pub use cleanup::CleanupSettings;
pub use metrics::LatencyTimer;
