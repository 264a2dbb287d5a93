//! Retention Sweeper (§4.6): bounds on-disk growth by deleting room
//! snapshots and asset blobs past their configured age, without ever
//! evicting a room snapshot while a live Session is attached.

use crate::config::{Config, SWEEP_INITIAL_DELAY_SECS};
use crate::engine::Engine;
use crate::store::SnapshotStore;
use std::sync::Arc;

/// Result of a single sweep, for logging and the admin-trigger response.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub rooms_checked: usize,
    pub rooms_deleted: usize,
    pub assets_checked: usize,
    pub assets_deleted: usize,
}

/// Spawns the background sweeper: an initial warm-up delay, then a sweep on
/// the configured interval. No-op (but still spawned and silent) if
/// `cleanup_enabled` is false.
pub fn spawn_sweeper(store: Arc<SnapshotStore>, engine: Arc<Engine>, config: Arc<Config>) {
    if !config.cleanup_enabled {
        println!("retention sweeper disabled (CLEANUP_ENABLED=false)");
        return;
    }

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(SWEEP_INITIAL_DELAY_SECS)).await;
        loop {
            let result = run_sweep(&store, &engine, &config).await;
            if result.rooms_deleted > 0 || result.assets_deleted > 0 {
                println!(
                    "retention sweep: checked {} rooms ({} deleted), {} assets ({} deleted)",
                    result.rooms_checked, result.rooms_deleted, result.assets_checked, result.assets_deleted
                );
            }
            tokio::time::sleep(config.sweep_interval()).await;
        }
    });
}

/// Runs one sweep and returns structured counts. Also used directly by the
/// admin-trigger route.
pub async fn run_sweep(store: &SnapshotStore, engine: &Engine, config: &Config) -> SweepResult {
    let now = chrono::Utc::now();
    let room_cutoff = config.room_retention();
    let asset_cutoff = config.asset_retention();

    let rooms = store.list_rooms();
    let mut rooms_deleted = 0;
    for entry in &rooms {
        if now - entry.mtime <= room_cutoff {
            continue;
        }
        if !engine.is_room_evictable(&entry.id).await {
            continue;
        }
        match store.delete_room(&entry.id) {
            Ok(()) => rooms_deleted += 1,
            Err(e) => eprintln!("retention: failed to delete room {}: {e}", entry.id),
        }
    }

    let assets = store.list_assets();
    let mut assets_deleted = 0;
    for entry in &assets {
        if now - entry.mtime <= asset_cutoff {
            continue;
        }
        match store.delete_asset(&entry.id) {
            Ok(()) => assets_deleted += 1,
            Err(e) => eprintln!("retention: failed to delete asset {}: {e}", entry.id),
        }
    }

    SweepResult {
        rooms_checked: rooms.len(),
        rooms_deleted,
        assets_checked: assets.len(),
        assets_deleted,
    }
}
