// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connectivity monitor.
//!
//! Combines raw network reachability with the user's "offline mode" switch
//! into a single effective-online signal, and turns the stream of observed
//! states into online/offline edges.
//!
//! ```text
//! platform reachability ──▶ report() ──┐
//!                                      ├──▶ watch<ConnectivityStatus> ──▶ ConnectivityWatch::next_edge()
//! user offline toggle ──▶ set_forced_offline() ──┘
//! ```
//!
//! Edges are derived from the values a subscriber actually observes. A flap
//! that happens entirely between two observations produces no edge.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Raw event from the platform reachability API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    pub reachable: bool,
}

/// Current connectivity inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    /// Network reachable according to the platform
    pub reachable: bool,
    /// User forced the app offline
    pub forced_offline: bool,
}

impl ConnectivityStatus {
    /// Remote operations are allowed only when this is true.
    #[must_use]
    #[inline]
    pub fn effective_online(&self) -> bool {
        self.reachable && !self.forced_offline
    }
}

/// Transition of the effective-online signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    CameOnline,
    WentOffline,
}

impl std::fmt::Display for ConnectivityEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CameOnline => write!(f, "CameOnline"),
            Self::WentOffline => write!(f, "WentOffline"),
        }
    }
}

/// Shared connectivity state. Clones observe and update the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    status: Arc<watch::Sender<ConnectivityStatus>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(reachable: bool, forced_offline: bool) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityStatus {
            reachable,
            forced_offline,
        });
        Self {
            status: Arc::new(tx),
        }
    }

    /// Monitor that starts reachable and not forced offline.
    #[must_use]
    pub fn online() -> Self {
        Self::new(true, false)
    }

    /// Monitor that starts unreachable.
    #[must_use]
    pub fn offline() -> Self {
        Self::new(false, false)
    }

    #[must_use]
    pub fn status(&self) -> ConnectivityStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn is_effectively_online(&self) -> bool {
        self.status().effective_online()
    }

    /// Record a platform reachability event. Repeated identical events are ignored.
    pub fn report(&self, event: Reachability) {
        let changed = self.status.send_if_modified(|status| {
            if status.reachable == event.reachable {
                return false;
            }
            status.reachable = event.reachable;
            true
        });
        if changed {
            debug!(reachable = event.reachable, "Network reachability changed");
            crate::metrics::set_connectivity(self.is_effectively_online());
        }
    }

    /// Flip the user-controlled offline mode.
    pub fn set_forced_offline(&self, forced: bool) {
        let changed = self.status.send_if_modified(|status| {
            if status.forced_offline == forced {
                return false;
            }
            status.forced_offline = forced;
            true
        });
        if changed {
            info!(forced_offline = forced, "Offline mode toggled");
            crate::metrics::set_connectivity(self.is_effectively_online());
        }
    }

    /// Forward an external reachability feed into this monitor until the feed closes.
    pub fn attach(&self, mut events: mpsc::Receiver<Reachability>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                monitor.report(event);
            }
            debug!("Reachability feed closed");
        })
    }

    /// Subscribe to effective-online edges, starting from the current state.
    #[must_use]
    pub fn subscribe(&self) -> ConnectivityWatch {
        let rx = self.status.subscribe();
        let last_online = rx.borrow().effective_online();
        ConnectivityWatch { rx, last_online }
    }
}

/// Subscription to connectivity edges. Dropping it unsubscribes.
pub struct ConnectivityWatch {
    rx: watch::Receiver<ConnectivityStatus>,
    last_online: bool,
}

impl ConnectivityWatch {
    /// Effective-online state as last observed by this subscriber.
    #[must_use]
    pub fn last_online(&self) -> bool {
        self.last_online
    }

    /// Wait for the next edge. `None` once every monitor handle is gone.
    pub async fn next_edge(&mut self) -> Option<ConnectivityEdge> {
        loop {
            self.rx.changed().await.ok()?;
            let online = self.rx.borrow_and_update().effective_online();
            if online == self.last_online {
                continue;
            }
            self.last_online = online;
            return Some(if online {
                ConnectivityEdge::CameOnline
            } else {
                ConnectivityEdge::WentOffline
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_effective_online_truth_table() {
        let cases = [
            (true, false, true),
            (true, true, false),
            (false, false, false),
            (false, true, false),
        ];
        for (reachable, forced_offline, expected) in cases {
            let status = ConnectivityStatus { reachable, forced_offline };
            assert_eq!(status.effective_online(), expected);
        }
    }

    #[test]
    fn test_forced_offline_overrides_reachability() {
        let monitor = ConnectivityMonitor::online();
        assert!(monitor.is_effectively_online());

        monitor.set_forced_offline(true);
        assert!(!monitor.is_effectively_online());
        assert!(monitor.status().reachable);

        monitor.set_forced_offline(false);
        assert!(monitor.is_effectively_online());
    }

    #[tokio::test]
    async fn test_edges_from_reachability() {
        let monitor = ConnectivityMonitor::offline();
        let mut watch = monitor.subscribe();
        assert!(!watch.last_online());

        monitor.report(Reachability { reachable: true });
        assert_eq!(watch.next_edge().await, Some(ConnectivityEdge::CameOnline));

        monitor.report(Reachability { reachable: false });
        assert_eq!(watch.next_edge().await, Some(ConnectivityEdge::WentOffline));
    }

    #[tokio::test]
    async fn test_no_edge_when_effective_state_unchanged() {
        let monitor = ConnectivityMonitor::offline();
        let mut watch = monitor.subscribe();

        // Forced offline while unreachable: still offline, no edge
        monitor.set_forced_offline(true);
        // Reachable but forced offline: still offline, no edge
        monitor.report(Reachability { reachable: true });
        // Releasing the override is the real edge
        monitor.set_forced_offline(false);

        assert_eq!(watch.next_edge().await, Some(ConnectivityEdge::CameOnline));
    }

    #[tokio::test]
    async fn test_watch_ends_when_monitor_dropped() {
        let monitor = ConnectivityMonitor::online();
        let mut watch = monitor.subscribe();
        drop(monitor);
        assert_eq!(watch.next_edge().await, None);
    }

    #[tokio::test]
    async fn test_attach_forwards_events() {
        let monitor = ConnectivityMonitor::offline();
        let mut watch = monitor.subscribe();
        let (tx, rx) = mpsc::channel(4);
        let handle = monitor.attach(rx);

        tx.send(Reachability { reachable: true }).await.unwrap();
        let edge = tokio::time::timeout(Duration::from_secs(1), watch.next_edge())
            .await
            .unwrap();
        assert_eq!(edge, Some(ConnectivityEdge::CameOnline));

        drop(tx);
        handle.await.unwrap();
        assert!(monitor.is_effectively_online());
    }

    #[test]
    fn test_edge_display() {
        assert_eq!(ConnectivityEdge::CameOnline.to_string(), "CameOnline");
        assert_eq!(ConnectivityEdge::WentOffline.to_string(), "WentOffline");
    }
}
