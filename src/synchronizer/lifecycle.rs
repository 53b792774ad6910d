//! Synchronizer lifecycle: start, reconnect loop, shutdown.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityEdge, ConnectivityMonitor};
use crate::session::Session;
use crate::storage::sql::SqliteLocalStore;
use crate::storage::traits::{RemoteProfileStore, StorageError};

use super::{SettingsSynchronizer, SyncError, SynchronizerState};

impl SettingsSynchronizer {
    /// Build a synchronizer backed by the SQLite file in `config.local_store_path`.
    pub async fn with_sqlite(
        config: SyncConfig,
        session: Session,
        remote: Arc<dyn RemoteProfileStore>,
        connectivity: ConnectivityMonitor,
    ) -> Result<Self, StorageError> {
        let path = config
            .local_store_path
            .clone()
            .ok_or_else(|| StorageError::Unavailable("no local_store_path configured".into()))?;
        let local = SqliteLocalStore::open(&path).await?;
        Ok(Self::new(config, session, Arc::new(local), remote, connectivity))
    }

    /// Restore the pending log and become `Ready`.
    ///
    /// Cold-start state per key comes from the persisted log: keys with
    /// entries start `PendingLocal`, everything else `Synced`. If already
    /// online, the restored entries are replayed right away (app foreground).
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SyncError> {
        let current = self.state();
        if current != SynchronizerState::Created {
            return Err(SyncError::AlreadyStarted(current));
        }

        self.set_state(SynchronizerState::Restoring);
        let restored = self.pending.restore(self.local.as_ref()).await;
        self.set_state(SynchronizerState::Ready);
        crate::metrics::set_connectivity(self.connectivity.is_effectively_online());
        info!(restored, online = self.connectivity.is_effectively_online(), "Settings synchronizer ready");

        if restored > 0 {
            if let Some(report) = self.on_foreground().await {
                debug!(?report, "Startup replay");
            }
        }
        Ok(())
    }

    /// Replay pending writes on every offline→online edge until shutdown.
    ///
    /// Only a `Ready` synchronizer enters the loop. Connectivity that came
    /// back between `start()` and this call produces no edge, so entries
    /// still pending while online are replayed on entry.
    pub async fn run(&self) {
        let mut edges = self.connectivity.subscribe();
        let mut state_rx = self.state_receiver();

        let entered = self.state.send_if_modified(|state| {
            if *state != SynchronizerState::Ready {
                return false;
            }
            *state = SynchronizerState::Running;
            true
        });
        if !entered {
            debug!(state = %self.state(), "Reconnect loop not entered");
            return;
        }
        crate::metrics::set_synchronizer_state(
            Some(&SynchronizerState::Ready.to_string()),
            &SynchronizerState::Running.to_string(),
        );
        info!("Settings synchronizer running");

        if edges.last_online() && !self.pending.is_empty() {
            let report = self.on_connectivity_restored().await;
            debug!(?report, "Catch-up sweep on loop entry");
        }

        loop {
            tokio::select! {
                edge = edges.next_edge() => match edge {
                    Some(ConnectivityEdge::CameOnline) => {
                        info!("Connectivity restored");
                        let report = self.on_connectivity_restored().await;
                        debug!(?report, "Reconnect sweep done");
                    }
                    Some(ConnectivityEdge::WentOffline) => {
                        info!("Connectivity lost, writes will stay pending");
                    }
                    None => break,
                },
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *state_rx.borrow_and_update();
                    if matches!(state, SynchronizerState::ShuttingDown | SynchronizerState::Stopped) {
                        break;
                    }
                }
            }
        }

        debug!("Reconnect loop exited");
    }

    /// Stop the reconnect loop and persist the pending log.
    pub async fn shutdown(&self) {
        info!("Shutting down settings synchronizer");
        self.set_state(SynchronizerState::ShuttingDown);
        self.persist_pending().await;
        self.set_state(SynchronizerState::Stopped);
        info!(pending = self.pending.len(), "Settings synchronizer stopped");
    }
}
