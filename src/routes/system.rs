//! Observability surface of the Asset & Metadata API (§4.4/§6): plain
//! health check, structured health, room/asset listings, process stats,
//! and the admin-triggered retention sweep.

use crate::config::Config;
use crate::engine::Engine;
use crate::retention::{self, SweepResult};
use crate::store::SnapshotStore;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[get("/api/health")]
pub async fn api_health(
    engine: &State<Arc<Engine>>,
    config: &State<Arc<Config>>,
    start_time: &State<Instant>,
) -> Json<Value> {
    let memory = memory_check();
    let active = engine.total_active_sessions().await;
    let storage = storage_check(config);

    let overall = if storage.0 != "healthy" {
        "unhealthy"
    } else if memory.2 {
        "warning"
    } else {
        "healthy"
    };

    Json(json!({
        "status": overall,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": start_time.elapsed().as_secs(),
        "checks": {
            "memory": { "status": memory.0, "details": memory.1, "warning": memory.2 },
            "connections": { "status": "healthy", "details": { "active": active } },
            "storage": { "status": storage.0, "details": storage.1 },
        }
    }))
}

#[get("/api/rooms")]
pub fn list_rooms(store: &State<Arc<SnapshotStore>>) -> Json<Value> {
    let now = chrono::Utc::now();
    let mut entries = store.list_rooms();
    entries.sort_by(|a, b| b.mtime.cmp(&a.mtime));

    let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
    let rooms: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "name": e.id,
                "size": e.size,
                "lastModified": e.mtime.to_rfc3339(),
                "isActive": (now - e.mtime) < chrono::Duration::hours(24),
            })
        })
        .collect();
    let active_rooms = entries
        .iter()
        .filter(|e| (now - e.mtime) < chrono::Duration::hours(24))
        .count();

    Json(json!({
        "totalRooms": entries.len(),
        "activeRooms": active_rooms,
        "storageUsed": total_bytes,
        "rooms": rooms,
        "lastUpdated": now.to_rfc3339(),
    }))
}

#[get("/api/assets")]
pub fn list_assets(store: &State<Arc<SnapshotStore>>) -> Json<Value> {
    let now = chrono::Utc::now();
    let mut entries = store.list_assets();
    entries.sort_by(|a, b| b.size.cmp(&a.size));

    let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
    let assets: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "name": e.id,
                "size": e.size,
                "lastModified": e.mtime.to_rfc3339(),
            })
        })
        .collect();

    Json(json!({
        "totalAssets": entries.len(),
        "storageUsed": total_bytes,
        "assets": assets,
        "lastUpdated": now.to_rfc3339(),
    }))
}

#[get("/api/stats")]
pub async fn stats(engine: &State<Arc<Engine>>, start_time: &State<Instant>) -> Json<Value> {
    Json(json!({
        "uptime": start_time.elapsed().as_secs(),
        "memoryUsage": memory_check().1,
        "runtimeVersion": format!("rustc/{}", option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")),
        "platform": std::env::consts::OS,
        "pid": std::process::id(),
        "activeConnections": engine.total_active_sessions().await,
        "environment": { "roomsLive": engine.room_ids().len() },
        "lastUpdated": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Manually trigger a retention sweep. Returns the counts of what was
/// pruned; mirrors the reference's ad hoc operational trigger.
#[post("/api/admin/sweep")]
pub async fn run_sweep_now(
    store: &State<Arc<SnapshotStore>>,
    engine: &State<Arc<Engine>>,
    config: &State<Arc<Config>>,
) -> Json<SweepResult> {
    Json(retention::run_sweep(store, engine, config).await)
}

#[rocket::catch(404)]
pub fn not_found() -> Json<Value> {
    Json(json!({ "error": "not found" }))
}

#[rocket::catch(413)]
pub fn payload_too_large() -> Json<Value> {
    Json(json!({ "error": "payload too large" }))
}

/// Best-effort resident-memory read; Linux-only (`/proc/self/statm`), and
/// degrades to "unknown" elsewhere rather than failing the health check.
fn memory_check() -> (&'static str, Value, bool) {
    match std::fs::read_to_string("/proc/self/statm") {
        Ok(contents) => {
            let pages: u64 = contents
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let page_size = 4096u64;
            let rss_bytes = pages * page_size;
            let warning = rss_bytes > 512 * 1024 * 1024;
            let status = if warning { "warning" } else { "healthy" };
            (status, json!({ "rssBytes": rss_bytes }), warning)
        }
        Err(_) => ("healthy", json!({ "rssBytes": null }), false),
    }
}

fn storage_check(config: &Config) -> (&'static str, Value) {
    let rooms_ok = std::fs::create_dir_all(&config.rooms_dir).is_ok();
    let assets_ok = std::fs::create_dir_all(&config.assets_dir).is_ok();
    let status = if rooms_ok && assets_ok { "healthy" } else { "unhealthy" };
    (
        status,
        json!({
            "roomsDir": config.rooms_dir.display().to_string(),
            "assetsDir": config.assets_dir.display().to_string(),
        }),
    )
}
