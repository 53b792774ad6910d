// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline round trip.
//!
//! Demonstrates:
//! 1. A synchronizer over a SQLite local store and an in-memory remote
//! 2. Writing preferences while forced offline
//! 3. Replay on the offline→online edge
//! 4. A remote change from "another device" showing up on load
//! 5. Rescheduling reminders
//! 6. Displaying captured metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example offline_roundtrip
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

use settings_sync::notifications::{InMemoryScheduler, NotificationPlanner, NotificationSettings, TimeOfDay};
use settings_sync::preference::FontSize;
use settings_sync::storage::{InMemoryRemoteStore, ProfileDocument, RemoteProfileStore, SqliteLocalStore, WriteMode};
use settings_sync::{ConnectivityMonitor, Session, SettingsSynchronizer, SyncConfig, SyncState, UserId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "settings_sync=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n── settings-sync: offline round trip ──\n");

    let dir = std::env::temp_dir().join("settings_sync_demo");
    std::fs::create_dir_all(&dir)?;
    let local = SqliteLocalStore::open(dir.join("settings.db")).await?;
    let remote = Arc::new(InMemoryRemoteStore::new());
    let connectivity = ConnectivityMonitor::online();

    let sync = Arc::new(SettingsSynchronizer::new(
        SyncConfig::default(),
        Session::new("demo-user"),
        Arc::new(local),
        remote.clone(),
        connectivity.clone(),
    ));
    sync.start().await?;
    let run = tokio::spawn({
        let sync = sync.clone();
        async move { sync.run().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // ─────────────────────────────────────────────────────────────────────
    // Offline writes
    // ─────────────────────────────────────────────────────────────────────
    println!("✈️  Offline mode on");
    connectivity.set_forced_offline(true);

    let outcome = sync.set(&FontSize::ExtraLarge).await?;
    println!("   font_size = extra_large → {:?}", outcome);
    let outcome = sync.set_preference("theme", json!("dark")).await?;
    println!("   theme = dark → {:?}", outcome);
    println!("   pending: {:?}", sync.stats().pending);

    // ─────────────────────────────────────────────────────────────────────
    // Reconnect
    // ─────────────────────────────────────────────────────────────────────
    println!("\n📶 Offline mode off");
    connectivity.set_forced_offline(false);
    for _ in 0..50 {
        if sync.sync_state("theme") == SyncState::Synced {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let user = UserId::new("demo-user");
    println!("   remote font_size = {:?}", remote.field(&user, "font_size"));
    println!("   remote theme     = {:?}", remote.field(&user, "theme"));

    // ─────────────────────────────────────────────────────────────────────
    // Another device changes the theme
    // ─────────────────────────────────────────────────────────────────────
    let mut fields = ProfileDocument::new();
    fields.insert("theme".into(), json!("light"));
    remote.write(&user, fields, WriteMode::Merge).await?;
    let loaded = sync.load_preference("theme").await?;
    println!("\n📱 Other device set theme → load returns {:?} from {:?}", loaded.value, loaded.source);

    // ─────────────────────────────────────────────────────────────────────
    // Reminders
    // ─────────────────────────────────────────────────────────────────────
    let scheduler = Arc::new(InMemoryScheduler::new());
    let planner = NotificationPlanner::new(scheduler.clone());
    let settings = NotificationSettings::daily(TimeOfDay::new(9, 0)?);
    planner.apply(&sync, &settings, Utc::now()).await?;
    planner.apply(&sync, &settings, Utc::now()).await?;
    println!("\n⏰ Daily 09:00 applied twice → {} active trigger(s)", scheduler.active_count());

    sync.shutdown().await;
    run.await?;

    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => format!("{} samples", samples.len()),
        };
        lines.push(format!("   {}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();
    for line in lines {
        println!("{line}");
    }
}
