use std::env;
use std::path::PathBuf;

/// Tunables not exposed as environment variables in the reference implementation.
pub const FLUSH_DEBOUNCE_MS: u64 = 500;
pub const MAINT_TICK_MS: u64 = 5_000;
pub const IDLE_GRACE_MS: u64 = 30_000;
pub const PING_INTERVAL_MS: u64 = 30_000;
pub const SWEEP_INITIAL_DELAY_SECS: u64 = 30;

/// Process configuration, read from the environment with defaults matching spec.md §6.
pub struct Config {
    pub port: u16,
    pub rooms_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub room_retention_days: i64,
    pub asset_retention_days: i64,
    pub cleanup_interval_hours: i64,
    pub cleanup_enabled: bool,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            rooms_dir: PathBuf::from("data/rooms"),
            assets_dir: PathBuf::from("data/assets"),
            room_retention_days: 7,
            asset_retention_days: 30,
            cleanup_interval_hours: 6,
            cleanup_enabled: true,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("PORT")
            && let Ok(n) = val.parse::<u16>()
        {
            config.port = n;
        }
        if let Ok(val) = env::var("ROOMS_DIR") {
            config.rooms_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("ASSETS_DIR") {
            config.assets_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("ROOM_RETENTION_DAYS")
            && let Ok(n) = val.parse::<i64>()
        {
            config.room_retention_days = n;
        }
        if let Ok(val) = env::var("ASSET_RETENTION_DAYS")
            && let Ok(n) = val.parse::<i64>()
        {
            config.asset_retention_days = n;
        }
        if let Ok(val) = env::var("CLEANUP_INTERVAL_HOURS")
            && let Ok(n) = val.parse::<i64>()
        {
            config.cleanup_interval_hours = n;
        }
        if let Ok(val) = env::var("CLEANUP_ENABLED") {
            config.cleanup_enabled = val.to_lowercase() != "false";
        }
        if let Ok(val) = env::var("MAX_UPLOAD_BYTES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.max_upload_bytes = n;
        }

        config
    }

    pub fn room_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.room_retention_days)
    }

    pub fn asset_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.asset_retention_days)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs((self.cleanup_interval_hours.max(0) as u64) * 3600)
    }
}
