//! Snapshot cache: the last successful aggregation, on disk and in memory.
//!
//! The file is replaced wholesale on every save; there is no history and no
//! partial update. Readers get an `Arc` of the in-memory copy, which is only
//! swapped after the file write has succeeded, so a failed save leaves both
//! the file and the served snapshot as they were.

use crate::error::CacheError;
use crate::models::{AggregationResult, Snapshot};
use crate::outputs::json::{read_snapshot, write_snapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    /// Open the store at `path`, loading any snapshot already there.
    ///
    /// # Arguments
    ///
    /// * `path` - Snapshot file; its directory is created on the first save
    ///
    /// # Returns
    ///
    /// A store serving the snapshot found on disk. A missing, truncated or
    /// otherwise unreadable file is logged and treated as no snapshot; the
    /// next save overwrites it.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let snapshot = match read_snapshot(&path).await {
            Ok(Some(snapshot)) => {
                info!(
                    articles = snapshot.items.len(),
                    timestamp = ?snapshot.timestamp,
                    "Loaded existing snapshot"
                );
                snapshot
            }
            Ok(None) => {
                info!("No snapshot yet");
                Snapshot::default()
            }
            Err(e) => {
                warn!(error = %e, "Snapshot file unreadable; starting empty");
                Snapshot::default()
            }
        };
        Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Persist `result` as the new snapshot, replacing the old one.
    ///
    /// # Arguments
    ///
    /// * `result` - The aggregation run to store
    ///
    /// # Returns
    ///
    /// `Ok(())` once the file is written and the in-memory copy swapped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the file cannot be written. The previous
    /// snapshot then stays in place, on disk and in memory.
    #[instrument(level = "info", skip_all, fields(items = result.items.len()))]
    pub async fn save(&self, result: &AggregationResult) -> Result<(), CacheError> {
        let snapshot = Snapshot::from(result);
        write_snapshot(&snapshot, &self.path).await?;
        *self.current.write().await = Arc::new(snapshot);
        Ok(())
    }

    /// The last saved snapshot, or the empty snapshot when none exists.
    pub async fn load(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// The last saved snapshot, or [`CacheError::Unavailable`] before the first save.
    pub async fn latest(&self) -> Result<Arc<Snapshot>, CacheError> {
        let snapshot = self.load().await;
        if snapshot.is_empty() {
            Err(CacheError::Unavailable)
        } else {
            Ok(snapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewsItem;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("hd_cache_{}_{name}", std::process::id()))
            .join("news_cache.json")
    }

    fn result(titles: &[&str]) -> AggregationResult {
        AggregationResult {
            items: titles
                .iter()
                .enumerate()
                .map(|(i, t)| NewsItem {
                    title: t.to_string(),
                    url: format!("https://site.test/news/{i}"),
                    source: "Site".into(),
                    summary: None,
                    published: None,
                })
                .collect(),
            generated_at: Utc::now(),
            per_source_errors: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_store_is_unavailable() {
        let store = SnapshotStore::open(scratch("empty")).await;
        let snapshot = store.load().await;
        assert!(snapshot.timestamp.is_none());
        assert!(snapshot.items.is_empty());
        assert!(matches!(store.latest().await, Err(CacheError::Unavailable)));
    }

    #[tokio::test]
    async fn test_save_replaces_wholesale_and_survives_reopen() {
        let path = scratch("replace");
        let store = SnapshotStore::open(&path).await;
        store
            .save(&result(&["First run headline one", "First run headline two"]))
            .await
            .unwrap();
        store.save(&result(&["Second run only headline"])).await.unwrap();

        let latest = store.latest().await.unwrap();
        assert_eq!(latest.items.len(), 1);
        assert_eq!(latest.items[0].title, "Second run only headline");

        let reopened = SnapshotStore::open(&path).await;
        assert_eq!(*reopened.load().await, *latest);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_opens_empty() {
        let path = scratch("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let store = SnapshotStore::open(&path).await;
        assert!(store.load().await.is_empty());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_truncated_file_opens_empty() {
        let path = scratch("truncated");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"timestamp": "2024-10-01T10:00:00Z", "articles": [{"tit"#).unwrap();
        let store = SnapshotStore::open(&path).await;
        assert!(matches!(store.latest().await, Err(CacheError::Unavailable)));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_snapshot() {
        let root = std::env::temp_dir().join(format!("hd_cache_{}_blocked", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        // A regular file where the snapshot's parent directory should be.
        let blocker = root.join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let store = SnapshotStore::open(blocker.join("news_cache.json")).await;
        assert!(store.save(&result(&["Headline that cannot be saved"])).await.is_err());
        assert!(store.load().await.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }
}
