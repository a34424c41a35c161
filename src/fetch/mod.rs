//! Fetch backends and the adaptive fallback chain.
//!
//! Every backend implements [`FetchBackend`]: given an absolute URL and a
//! timeout it returns the document text or a typed [`FetchFailure`]. Backends
//! are combined into a [`FetchChain`], tried in order and short-circuiting on
//! the first usable document.
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | Plain HTTP | [`http`] | Lightweight client, browser user agent |
//! | Hardened HTTP | [`http`] | Full browser header profile plus cookie jar |
//! | Headless browser | `headless` | Renders JavaScript; needs the `headless` feature |
//!
//! # Adaptive mode
//!
//! With [`FetchPolicy::adaptive`] set, a successful response that is empty,
//! shorter than [`FetchPolicy::min_body_len`], or that carries a block-page
//! marker near the top is treated as [`FetchFailure::Blocked`] and the next
//! backend is tried. Without it, only the first backend is used.

pub mod http;
pub mod retry;

#[cfg(feature = "headless")]
pub mod headless;

use crate::config::FetchSettings;
use crate::error::FetchFailure;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Text patterns that identify an anti-bot challenge page, matched case-insensitively.
pub const BLOCK_PAGE_MARKERS: &[&str] = &[
    "enable javascript",
    "cloudflare",
    "captcha",
    "access denied",
    "just a moment",
    "are you a robot",
];

/// A way to turn a URL into document text.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Fetch `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchFailure>;

    /// Longest one [`fetch`](FetchBackend::fetch) call may take when each
    /// attempt is bounded by `timeout`.
    fn time_budget(&self, timeout: Duration) -> Duration {
        timeout
    }
}

/// Escalation policy for a [`FetchChain`].
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub adaptive: bool,
    pub timeout: Duration,
    pub max_attempts: usize,
    pub min_body_len: usize,
    pub block_scan_chars: usize,
}

impl FetchPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            adaptive: settings.adaptive,
            timeout: settings.timeout(),
            max_attempts: settings.max_attempts.max(1),
            min_body_len: settings.min_body_len,
            block_scan_chars: settings.block_scan_chars,
        }
    }

    /// Returns why `body` should not be trusted as real content, if anything.
    pub fn block_reason(&self, body: &str) -> Option<String> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Some("empty body".to_string());
        }
        let len = trimmed.chars().count();
        if len < self.min_body_len {
            return Some(format!("body too short ({len} chars)"));
        }
        let head: String = trimmed
            .chars()
            .take(self.block_scan_chars)
            .collect::<String>()
            .to_lowercase();
        BLOCK_PAGE_MARKERS
            .iter()
            .find(|marker| head.contains(*marker))
            .map(|marker| format!("block-page marker {marker:?}"))
    }
}

/// Ordered list of backends tried in sequence.
#[derive(Clone)]
pub struct FetchChain {
    backends: Vec<Arc<dyn FetchBackend>>,
    policy: FetchPolicy,
}

impl std::fmt::Debug for FetchChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchChain")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("policy", &self.policy)
            .finish()
    }
}

impl FetchChain {
    pub fn new(backends: Vec<Arc<dyn FetchBackend>>, policy: FetchPolicy) -> Self {
        Self { backends, policy }
    }

    /// Build the standard chain: plain HTTP, hardened HTTP, then the headless
    /// browser when compiled in. Each HTTP backend retries per the policy.
    pub fn standard(settings: &FetchSettings) -> Result<Self, FetchFailure> {
        let policy = FetchPolicy::from_settings(settings);
        let plain = retry::Retry::new(http::HttpBackend::plain(settings)?, policy.max_attempts);
        let hardened =
            retry::Retry::new(http::HttpBackend::hardened(settings)?, policy.max_attempts);

        #[allow(unused_mut)]
        let mut backends: Vec<Arc<dyn FetchBackend>> = vec![Arc::new(plain), Arc::new(hardened)];

        #[cfg(feature = "headless")]
        backends.push(Arc::new(headless::HeadlessBackend::new(settings)));

        Ok(Self::new(backends, policy))
    }

    fn usable(&self) -> &[Arc<dyn FetchBackend>] {
        if self.policy.adaptive {
            &self.backends
        } else {
            &self.backends[..self.backends.len().min(1)]
        }
    }

    /// Worst-case duration of [`FetchChain::fetch`]: every usable backend
    /// running out its full budget, retries included.
    pub fn time_budget(&self) -> Duration {
        self.usable()
            .iter()
            .map(|b| b.time_budget(self.policy.timeout))
            .sum()
    }

    /// Fetch `url` through the chain.
    ///
    /// In adaptive mode a blocked or failed backend hands over to the next one;
    /// the last failure is returned when every backend is exhausted.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let per_attempt = self.policy.timeout;

        let mut last = FetchFailure::Backend("no fetch backend configured".to_string());
        for backend in self.usable() {
            let budget = backend.time_budget(per_attempt);
            let outcome = match tokio::time::timeout(budget, backend.fetch(url, per_attempt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchFailure::Timeout(budget.as_secs())),
            };

            match outcome {
                Ok(body) => {
                    if !self.policy.adaptive {
                        return Ok(body);
                    }
                    match self.policy.block_reason(&body) {
                        None => {
                            debug!(backend = backend.name(), bytes = body.len(), "Fetched document");
                            return Ok(body);
                        }
                        Some(reason) => {
                            info!(backend = backend.name(), %reason, "Response looks blocked; escalating");
                            last = FetchFailure::Blocked(reason);
                        }
                    }
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Backend failed");
                    last = e;
                }
            }
        }
        Err(last)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REAL_PAGE: &str = "<html><body><article><h2>Real headline for testing</h2></article></body></html>";

    #[test]
    fn test_block_reason_detects_markers() {
        let policy = policy(true);
        assert!(policy.block_reason("").is_some());
        assert!(policy.block_reason("tiny").is_some());
        let challenge = "<html><title>Just a moment...</title><body>Please enable JavaScript</body></html>";
        assert!(policy.block_reason(challenge).unwrap().contains("marker"));
        assert!(policy.block_reason(REAL_PAGE).is_none());
    }

    #[test]
    fn test_block_scan_limited_to_head() {
        let mut policy = policy(true);
        policy.block_scan_chars = 30;
        let body = format!("{}{}", "x".repeat(100), " captcha ");
        assert!(policy.block_reason(&body).is_none());
    }

    #[tokio::test]
    async fn test_adaptive_chain_escalates_on_block_page() {
        let light = Arc::new(FixedBackend::new("light", "<html>Access Denied by Cloudflare guard page</html>"));
        let heavy = Arc::new(FixedBackend::new("heavy", REAL_PAGE));
        let chain = FetchChain::new(vec![light.clone(), heavy.clone()], policy(true));

        let body = chain.fetch("https://site.test/").await.unwrap();
        assert_eq!(body, REAL_PAGE);
        assert_eq!(light.calls.load(Ordering::SeqCst), 1);
        assert_eq!(heavy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chain_short_circuits_on_first_success() {
        let first = Arc::new(FixedBackend::new("first", REAL_PAGE));
        let second = Arc::new(FixedBackend::new("second", REAL_PAGE));
        let chain = FetchChain::new(vec![first.clone(), second.clone()], policy(true));

        chain.fetch("https://site.test/").await.unwrap();
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_adaptive_uses_only_first_backend() {
        let failing: Arc<dyn FetchBackend> =
            Arc::new(FailingBackend(FetchFailure::HttpStatus { code: 403 }));
        let heavy = Arc::new(FixedBackend::new("heavy", REAL_PAGE));
        let chain = FetchChain::new(vec![failing, heavy.clone()], policy(false));

        let err = chain.fetch("https://site.test/").await.unwrap_err();
        assert_eq!(err, FetchFailure::HttpStatus { code: 403 });
        assert_eq!(heavy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_last_failure() {
        let chain = FetchChain::new(
            vec![
                Arc::new(FailingBackend(FetchFailure::Network("reset".into()))),
                Arc::new(FixedBackend::new("blocked", "<p>captcha required to continue here</p>")),
            ],
            policy(true),
        );
        let err = chain.fetch("https://site.test/").await.unwrap_err();
        assert!(matches!(err, FetchFailure::Blocked(_)));
    }

    /// Times out on its first call, then serves the page.
    struct SlowOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FetchBackend for SlowOnce {
        fn name(&self) -> &'static str {
            "slow-once"
        }

        async fn fetch(&self, _url: &str, timeout: Duration) -> Result<String, FetchFailure> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(timeout).await;
                return Err(FetchFailure::Timeout(timeout.as_secs()));
            }
            Ok(REAL_PAGE.to_string())
        }
    }

    #[tokio::test]
    async fn test_retry_after_timeout_fits_chain_budget() {
        let retrying = retry::Retry::new(SlowOnce { calls: AtomicUsize::new(0) }, 2)
            .with_base_delay(Duration::from_millis(1));
        let chain = FetchChain::new(vec![Arc::new(retrying)], policy(true));

        assert_eq!(chain.fetch("https://site.test/").await.unwrap(), REAL_PAGE);
    }

    #[test]
    fn test_chain_budget_sums_usable_backends() {
        let mut p = policy(true);
        p.timeout = Duration::from_secs(10);
        let retrying: Arc<dyn FetchBackend> = Arc::new(retry::Retry::new(
            FixedBackend::new("retrying", REAL_PAGE),
            3,
        ));
        let single: Arc<dyn FetchBackend> = Arc::new(FixedBackend::new("single", REAL_PAGE));

        let adaptive = FetchChain::new(vec![retrying.clone(), single.clone()], p.clone());
        assert!(adaptive.time_budget() >= Duration::from_secs(40));

        p.adaptive = false;
        let first_only = FetchChain::new(vec![single, retrying], p);
        assert_eq!(first_only.time_budget(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_hanging_backend_times_out() {
        let chain = FetchChain::new(vec![Arc::new(RoutedBackend { routes: vec![] })], policy(true));
        let err = chain.fetch("https://slow.test/").await.unwrap_err();
        assert_eq!(err, FetchFailure::Timeout(0));
    }
}
