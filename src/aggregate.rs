//! Concurrent fetch, extract and normalize across all configured sources.
//!
//! Each source runs as an independent pipeline under its own timeout. A
//! pipeline that fails or times out contributes zero items and an entry in
//! `per_source_errors`; it never fails the run. A global deadline bounds the
//! whole run: sources still in flight when it passes are abandoned.
//!
//! The merged list is ordered by the configured source table (then document
//! order within a source), independent of completion order, and passes through
//! one cross-source dedup on `(lower-cased title, url)`.

use crate::config::Settings;
use crate::extract;
use crate::fetch::FetchChain;
use crate::models::{AggregationResult, NewsItem, SourceSpec};
use crate::normalize::{Rules, normalize};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Runs aggregation passes over a fetch chain.
#[derive(Debug, Clone)]
pub struct Aggregator {
    chain: FetchChain,
    settings: Settings,
}

impl Aggregator {
    pub fn new(chain: FetchChain, settings: Settings) -> Self {
        Self { chain, settings }
    }

    /// Per-source pipeline bound: the configured timeout, raised to the fetch
    /// chain's worst case so a slow last backend is not cut off.
    fn source_budget(&self) -> Duration {
        self.settings
            .aggregate
            .source_timeout()
            .max(self.chain.time_budget())
    }

    /// Fetch, extract and normalize a single source.
    #[instrument(level = "info", skip_all, fields(source = %spec.name))]
    async fn run_source(&self, spec: &SourceSpec) -> Result<Vec<NewsItem>, String> {
        let t0 = Instant::now();
        let raw = self.chain.fetch(&spec.endpoint).await.map_err(|e| {
            warn!(error = %e, "Fetch failed");
            format!("fetch: {e}")
        })?;

        let candidates = extract::extract(&raw, spec);
        let rules = Rules::for_source(&self.settings, spec);
        let items = normalize(candidates, spec, &rules);
        info!(
            bytes = raw.len(),
            count = items.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Source complete"
        );
        Ok(items)
    }

    /// Aggregate `sources` into one result.
    ///
    /// # Arguments
    ///
    /// * `sources` - The sources to run, in the order their items are merged
    ///
    /// # Returns
    ///
    /// The merged, deduplicated items plus one `per_source_errors` entry for
    /// every source that failed, timed out or was abandoned at the global
    /// deadline. Never fails as a whole: with every source down the result is
    /// simply empty.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn aggregate(&self, sources: &[SourceSpec]) -> AggregationResult {
        let t0 = Instant::now();
        let source_timeout = self.source_budget();
        let deadline = tokio::time::Instant::now() + self.settings.aggregate.global_timeout();
        let concurrency = self.settings.aggregate.concurrency.max(1);

        // Built eagerly so the returned future stays `Send`.
        let futs: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(i, spec)| async move {
                let outcome = match tokio::time::timeout(source_timeout, self.run_source(spec)).await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(source = %spec.name, "Source pipeline timed out");
                        Err(format!("timed out after {}s", source_timeout.as_secs()))
                    }
                };
                (i, outcome)
            })
            .collect();
        let mut pipelines = stream::iter(futs).buffer_unordered(concurrency);

        let mut slots: Vec<Option<Result<Vec<NewsItem>, String>>> = vec![None; sources.len()];
        loop {
            match tokio::time::timeout_at(deadline, pipelines.next()).await {
                Ok(Some((i, outcome))) => slots[i] = Some(outcome),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = slots.iter().filter(|s| s.is_none()).count(),
                        "Global timeout reached; abandoning unfinished sources"
                    );
                    break;
                }
            }
        }
        drop(pipelines);

        let mut per_source_errors = BTreeMap::new();
        let mut merged = Vec::new();
        for (spec, slot) in sources.iter().zip(slots) {
            match slot {
                Some(Ok(items)) => merged.extend(items),
                Some(Err(e)) => {
                    per_source_errors.insert(spec.name.clone(), e);
                }
                None => {
                    per_source_errors.insert(
                        spec.name.clone(),
                        "abandoned at global timeout".to_string(),
                    );
                }
            }
        }

        let before = merged.len();
        let items: Vec<NewsItem> = merged.into_iter().unique_by(NewsItem::dedup_key).collect();
        debug!(removed = before - items.len(), "Cross-source dedup");

        info!(
            items = items.len(),
            failed = per_source_errors.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Aggregation complete"
        );
        AggregationResult {
            items,
            generated_at: Utc::now(),
            per_source_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{FailingBackend, FixedBackend, RoutedBackend, policy};
    use crate::fetch::{FetchBackend, FetchPolicy};
    use crate::models::ExtractorKind;
    use crate::error::FetchFailure;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn page(slug: &str, titles: &[&str]) -> String {
        let cards: String = titles
            .iter()
            .enumerate()
            .map(|(i, t)| format!(r#"<article><h2><a href="/news/{slug}-{i}">{t}</a></h2></article>"#))
            .collect();
        format!("<html><body>{cards}</body></html>")
    }

    fn source(name: &str, endpoint: &str) -> SourceSpec {
        SourceSpec::new(name, endpoint, ExtractorKind::Generic)
    }

    fn aggregator(backend: Arc<dyn FetchBackend>, policy: FetchPolicy, global_secs: u64) -> Aggregator {
        let mut settings = Settings::default();
        settings.aggregate.global_timeout_secs = global_secs;
        settings.aggregate.source_timeout_secs = 30;
        Aggregator::new(FetchChain::new(vec![backend], policy), settings)
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_sources() {
        let backend = Arc::new(RoutedBackend {
            routes: vec![
                (
                    "https://a.test/".into(),
                    page("a", &["Alpha story on the economy today", "Second alpha story of the day"]),
                ),
                ("https://c.test/".into(), page("c", &["Gamma story about global trade"])),
            ],
        });
        let sources = vec![
            source("A", "https://a.test/"),
            source("B", "https://b.test/"),
            source("C", "https://c.test/"),
        ];
        let agg = aggregator(backend, policy(false), 5);

        let t0 = Instant::now();
        let result = agg.aggregate(&sources).await;
        assert!(t0.elapsed() < Duration::from_secs(3));

        let names: Vec<_> = result.items.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(names, vec!["A", "A", "C"]);
        assert!(result.is_partial());
        assert_eq!(result.per_source_errors.len(), 1);
        assert!(result.per_source_errors["B"].contains("timed out"));
    }

    #[tokio::test]
    async fn test_global_timeout_abandons_in_flight_sources() {
        let backend = Arc::new(RoutedBackend {
            routes: vec![(
                "https://a.test/".into(),
                page("a", &["Alpha story on the economy today"]),
            )],
        });
        let mut slow = policy(false);
        slow.timeout = Duration::from_secs(30);
        let agg = aggregator(backend, slow, 1);
        let sources = vec![source("A", "https://a.test/"), source("B", "https://b.test/")];

        let t0 = Instant::now();
        let result = agg.aggregate(&sources).await;
        assert!(t0.elapsed() < Duration::from_secs(3));
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.per_source_errors["B"], "abandoned at global timeout");
    }

    #[tokio::test]
    async fn test_cross_source_dedup_and_unique_titles() {
        let shared = page("wire", &["Syndicated wire story about oil prices"]);
        let backend = Arc::new(FixedBackend::new("fixed", shared));
        let sources = vec![
            source("One", "https://wire.test/"),
            source("Two", "https://wire.test/"),
        ];
        let agg = aggregator(backend, policy(false), 5);
        let result = agg.aggregate(&sources).await;

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].source, "One");
        let keys: HashSet<_> = result
            .items
            .iter()
            .map(|i| (i.source.clone(), i.title.to_lowercase()))
            .collect();
        assert_eq!(keys.len(), result.items.len());
    }

    #[tokio::test]
    async fn test_aggregate_future_can_be_spawned() {
        let backend = Arc::new(FixedBackend::new("fixed", page("s", &["Spawned run headline on markets"])));
        let agg = aggregator(backend, policy(false), 5);
        let sources = vec![source("S", "https://s.test/")];

        let result = tokio::spawn(async move { agg.aggregate(&sources).await })
            .await
            .unwrap();
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn test_source_budget_covers_fetch_chain() {
        let mut slow = policy(true);
        slow.timeout = Duration::from_secs(30);
        let backends: Vec<Arc<dyn FetchBackend>> = vec![
            Arc::new(FixedBackend::new("first", "")),
            Arc::new(FixedBackend::new("second", "")),
        ];
        let mut settings = Settings::default();
        settings.aggregate.source_timeout_secs = 45;
        let agg = Aggregator::new(FetchChain::new(backends, slow), settings.clone());
        assert_eq!(agg.source_budget(), Duration::from_secs(60));

        settings.aggregate.source_timeout_secs = 90;
        let agg = Aggregator::new(agg.chain.clone(), settings);
        assert_eq!(agg.source_budget(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_total_failure_is_empty_not_error() {
        let backend = Arc::new(FailingBackend(FetchFailure::HttpStatus { code: 403 }));
        let sources = vec![source("A", "https://a.test/"), source("B", "https://b.test/")];
        let agg = aggregator(backend, policy(true), 5);
        let result = agg.aggregate(&sources).await;

        assert!(result.items.is_empty());
        assert_eq!(result.per_source_errors.len(), 2);
        assert!(result.per_source_errors["A"].contains("403"));
    }
}
