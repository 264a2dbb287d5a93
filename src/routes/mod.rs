// Route module decomposition — each domain area in its own file.

mod assets;
mod system;
mod unfurl;

pub use assets::{download_asset, upload_asset};
pub use system::{
    api_health, health, list_assets, list_rooms, not_found, payload_too_large, run_sweep_now, stats,
};
pub use unfurl::unfurl;
