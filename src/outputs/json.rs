//! Snapshot file reading and writing.
//!
//! The snapshot is one JSON document:
//!
//! ```text
//! {
//!   "timestamp": "2024-10-01T10:00:00Z",
//!   "articles": [ { "title": ..., "link": ..., "source": ..., "summary"?: ..., "pubDate"?: ... } ]
//! }
//! ```
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the target,
//! so a reader sees either the previous snapshot or the new one, never a
//! partial file.

use crate::error::CacheError;
use crate::models::Snapshot;
use crate::utils::ensure_parent_dir;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replace the snapshot at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), articles = snapshot.items.len()))]
pub async fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), CacheError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    ensure_parent_dir(path).await?;

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, json).await {
        error!(tmp = %tmp.display(), error = %e, "Failed to write temporary snapshot");
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        error!(error = %e, "Failed to move snapshot into place");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    info!("Wrote snapshot");
    Ok(())
}

/// Read the snapshot at `path`; `Ok(None)` when no file exists yet.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, CacheError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    Ok(Some(snapshot))
}
