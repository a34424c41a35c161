//! Consumer-facing entry points over the aggregator and the snapshot cache.
//!
//! A client asks for [`NewsService::get_latest_news`] (served from the cache,
//! never a live fetch) or forces a refresh. The background refresher re-runs
//! aggregation on a fixed interval; refreshes are serialized so there is never
//! more than one snapshot writer.

use crate::aggregate::Aggregator;
use crate::cache::SnapshotStore;
use crate::config::Settings;
use crate::error::CacheError;
use crate::fetch::FetchChain;
use crate::models::{AggregationResult, Snapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

/// What a refresh did with its aggregation result.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The snapshot was replaced.
    Saved(AggregationResult),
    /// Every source failed; the previous snapshot was kept.
    Kept(AggregationResult),
}

impl RefreshOutcome {
    pub fn result(&self) -> &AggregationResult {
        match self {
            RefreshOutcome::Saved(r) | RefreshOutcome::Kept(r) => r,
        }
    }
}

#[derive(Debug)]
pub struct NewsService {
    settings: Settings,
    aggregator: Aggregator,
    store: SnapshotStore,
    refresh_lock: Mutex<()>,
}

impl NewsService {
    pub fn new(settings: Settings, aggregator: Aggregator, store: SnapshotStore) -> Self {
        Self {
            settings,
            aggregator,
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Build the service with the standard fetch chain and the configured cache path.
    pub async fn from_settings(settings: Settings) -> Result<Self, Box<dyn std::error::Error>> {
        let chain = FetchChain::standard(&settings.fetch)?;
        info!(?chain, "Fetch chain ready");
        let aggregator = Aggregator::new(chain, settings.clone());
        let store = SnapshotStore::open(&settings.cache.path).await;
        Ok(Self::new(settings, aggregator, store))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The cached snapshot, or [`CacheError::Unavailable`] before the first refresh.
    pub async fn get_latest_news(&self) -> Result<Arc<Snapshot>, CacheError> {
        self.store.latest().await
    }

    /// Aggregate all configured sources without touching the cache.
    pub async fn fetch_live(&self) -> AggregationResult {
        self.aggregator.aggregate(&self.settings.sources).await
    }

    /// Aggregate now and save the result.
    ///
    /// A run where nothing was extracted and some source failed does not
    /// replace the snapshot. A save error is returned and the previous
    /// snapshot stays in place.
    #[instrument(level = "info", skip_all)]
    pub async fn force_refresh(&self) -> Result<RefreshOutcome, CacheError> {
        let _guard = self.refresh_lock.lock().await;
        let result = self.fetch_live().await;
        if result.items.is_empty() && result.is_partial() {
            warn!(
                failed = result.per_source_errors.len(),
                "Refresh produced nothing; keeping previous snapshot"
            );
            return Ok(RefreshOutcome::Kept(result));
        }
        self.store.save(&result).await?;
        info!(
            items = result.items.len(),
            failed = result.per_source_errors.len(),
            "Snapshot refreshed"
        );
        Ok(RefreshOutcome::Saved(result))
    }

    /// Refresh on the configured interval until the task is aborted.
    ///
    /// The first refresh runs immediately.
    pub fn spawn_refresher(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.settings.cache.refresh_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.force_refresh().await {
                    error!(error = %e, "Background refresh failed; serving previous snapshot");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchFailure;
    use crate::fetch::testing::{FailingBackend, FixedBackend, policy};
    use crate::fetch::FetchBackend;
    use crate::models::{ExtractorKind, SourceSpec};
    use std::path::PathBuf;
    use std::time::Duration;

    const PAGE: &str = r#"<html><body>
        <article><h2><a href="/news/one-1">Exporters brace for a new tariff round</a></h2></article>
        <article><h2><a href="/news/two-2">Central bank holds rates steady again</a></h2></article>
    </body></html>"#;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("hd_service_{}_{name}", std::process::id()))
            .join("news_cache.json")
    }

    async fn service(backend: Arc<dyn FetchBackend>, path: &PathBuf) -> NewsService {
        let mut settings = Settings::default();
        settings.sources = vec![SourceSpec::new(
            "Site",
            "https://site.test/",
            ExtractorKind::Generic,
        )];
        settings.cache.path = path.display().to_string();
        let chain = FetchChain::new(vec![backend], policy(false));
        let aggregator = Aggregator::new(chain, settings.clone());
        let store = SnapshotStore::open(path).await;
        NewsService::new(settings, aggregator, store)
    }

    #[tokio::test]
    async fn test_not_ready_until_first_refresh() {
        let path = scratch("ready");
        let svc = service(Arc::new(FixedBackend::new("fixed", PAGE)), &path).await;
        assert!(matches!(
            svc.get_latest_news().await,
            Err(CacheError::Unavailable)
        ));

        let outcome = svc.force_refresh().await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Saved(_)));
        let latest = svc.get_latest_news().await.unwrap();
        assert_eq!(latest.items.len(), 2);
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let path = scratch("keep");
        let good = service(Arc::new(FixedBackend::new("fixed", PAGE)), &path).await;
        good.force_refresh().await.unwrap();
        let before = good.get_latest_news().await.unwrap();

        let failing = Arc::new(FailingBackend(FetchFailure::Timeout(1)));
        let bad = service(failing, &path).await;
        let outcome = bad.force_refresh().await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Kept(_)));
        assert!(outcome.result().is_partial());
        assert_eq!(*bad.get_latest_news().await.unwrap(), *before);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_refresher_runs_immediately() {
        let path = scratch("refresher");
        let backend = Arc::new(FixedBackend::new("fixed", PAGE));
        let svc = Arc::new(service(backend.clone(), &path).await);
        let handle = svc.clone().spawn_refresher();

        let mut ready = false;
        for _ in 0..50 {
            if svc.get_latest_news().await.is_ok() {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(ready);
        assert!(backend.calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
