//! Snapshot Store (§4.1): durable key -> blob storage for per-room document
//! snapshots and per-id asset blobs. Two independent keyspaces, each a flat
//! directory of opaque files keyed by a sanitized identifier.

use crate::errors::StoreError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One entry in a `listRooms()`/`listAssets()` enumeration.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: String,
    pub size: u64,
    pub mtime: chrono::DateTime<chrono::Utc>,
}

pub struct SnapshotStore {
    rooms_dir: PathBuf,
    assets_dir: PathBuf,
}

/// Rejects any id containing a path separator or `..` after the caller has
/// already URL-decoded it. This is the fix for the latent bug noted in
/// spec.md §9: the id must never be trusted as a raw filename.
fn sanitize_id(id: &str) -> Result<&str, StoreError> {
    if id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.split('/').any(|part| part == "..")
        || id == ".."
        || id == "."
    {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(id)
}

fn read_entry(path: &Path, id: &str) -> Option<Entry> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime: chrono::DateTime<chrono::Utc> = meta.modified().ok()?.into();
    Some(Entry {
        id: id.to_string(),
        size: meta.len(),
        mtime,
    })
}

fn list_dir(dir: &Path) -> Vec<Entry> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for item in read_dir {
        // Missing-file races during stat (concurrent delete) are swallowed.
        let Ok(item) = item else { continue };
        let Some(name) = item.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(entry) = read_entry(&item.path(), &name) {
            out.push(entry);
        }
    }
    out
}

/// Exposed so callers outside the store (the Gateway's roomId guard) can
/// reject an invalid id before ever touching the filesystem.
pub fn is_valid_id(id: &str) -> bool {
    sanitize_id(id).is_ok()
}

impl SnapshotStore {
    pub fn new(rooms_dir: impl Into<PathBuf>, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            rooms_dir: rooms_dir.into(),
            assets_dir: assets_dir.into(),
        }
    }

    fn room_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.rooms_dir.join(sanitize_id(id)?))
    }

    fn asset_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.assets_dir.join(sanitize_id(id)?))
    }

    pub fn read_room(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        read_file(&self.room_path(id)?)
    }

    pub fn write_room(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        write_file(&self.rooms_dir, &self.room_path(id)?, bytes)
    }

    pub fn delete_room(&self, id: &str) -> Result<(), StoreError> {
        delete_file(&self.room_path(id)?)
    }

    pub fn list_rooms(&self) -> Vec<Entry> {
        list_dir(&self.rooms_dir)
    }

    pub fn read_asset(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        read_file(&self.asset_path(id)?)
    }

    pub fn write_asset(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        write_file(&self.assets_dir, &self.asset_path(id)?, bytes)
    }

    pub fn delete_asset(&self, id: &str) -> Result<(), StoreError> {
        delete_file(&self.asset_path(id)?)
    }

    pub fn list_assets(&self) -> Vec<Entry> {
        list_dir(&self.assets_dir)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// Write-to-temp-then-rename, upgrading the teacher's plain-overwrite approach
/// for crash safety (spec.md §9 Open Question, resolved in SPEC_FULL.md §13).
fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir)?;
    let tmp_name = format!(".{}.{}.tmp", path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot"), tmp_suffix());
    let tmp_path = dir.join(tmp_name);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}")
}

fn delete_file(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}
