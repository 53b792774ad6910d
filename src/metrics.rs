// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for settings-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host app is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `settings_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: set, load, replay, restore, persist
//! - `origin`: write, replay
//! - `status`: success, error, skipped

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a local store write outcome
pub fn record_local_write(status: &str) {
    counter!(
        "settings_sync_local_writes_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a swallowed local store failure
pub fn record_local_error(operation: &str) {
    counter!(
        "settings_sync_local_errors_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a remote profile write outcome
pub fn record_remote_write(origin: &str, status: &str) {
    counter!(
        "settings_sync_remote_writes_total",
        "origin" => origin.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a remote profile read outcome
pub fn record_remote_read(status: &str) {
    counter!(
        "settings_sync_remote_reads_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "settings_sync_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set pending log depth
pub fn set_pending_entries(count: usize) {
    gauge!("settings_sync_pending_entries").set(count as f64);
}

/// Record a reconnect/foreground sweep
pub fn record_sweep(replayed: usize, completed: bool) {
    counter!(
        "settings_sync_sweeps_total",
        "status" => if completed { "complete" } else { "partial" }.to_string()
    )
    .increment(1);
    counter!("settings_sync_replayed_entries_total").increment(replayed as u64);
}

/// Set effective connectivity (1 = online, 0 = offline)
pub fn set_connectivity(online: bool) {
    gauge!("settings_sync_effective_online").set(if online { 1.0 } else { 0.0 });
}

/// Set remote health status (1 = healthy, 0 = degraded)
pub fn set_remote_healthy(healthy: bool) {
    gauge!("settings_sync_remote_healthy").set(if healthy { 1.0 } else { 0.0 });
}

/// Record a change broadcast to subscribers
pub fn record_preference_change(origin: &str) {
    counter!(
        "settings_sync_preference_changes_total",
        "origin" => origin.to_string()
    )
    .increment(1);
}

/// Record a notification scheduling request
pub fn record_schedule(kind: &str, status: &str) {
    counter!(
        "settings_sync_schedule_requests_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Move the lifecycle state gauge from `previous` to `current`.
///
/// Exactly one `state` label reads 1 at a time; each transition is also
/// counted.
pub fn set_synchronizer_state(previous: Option<&str>, current: &str) {
    if let Some(previous) = previous {
        if previous != current {
            gauge!(
                "settings_sync_state",
                "state" => previous.to_string()
            )
            .set(0.0);
            counter!(
                "settings_sync_state_transitions_total",
                "from" => previous.to_string(),
                "to" => current.to_string()
            )
            .increment(1);
        }
    }
    gauge!(
        "settings_sync_state",
        "state" => current.to_string()
    )
    .set(1.0);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}
