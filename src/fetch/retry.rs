//! Retry decorator with exponential backoff for any [`FetchBackend`].
//!
//! Several target sites answer the first request of a session with 401/403 and
//! serve the page on the next one, so each HTTP backend gets a small retry
//! budget before the chain escalates.
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (see [`FetchFailure::is_transient`])
//! - Exponential backoff starting at 500ms, capped at 4 seconds
//! - Random jitter (0-250ms) added to each delay

use super::FetchBackend;
use crate::error::FetchFailure;
use async_trait::async_trait;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{instrument, warn};

const MAX_JITTER_MS: u64 = 250;

/// Wrapper that adds exponential backoff retry logic to a [`FetchBackend`].
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct Retry<T> {
    inner: T,
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> Retry<T>
where
    T: FetchBackend,
{
    /// Wrap `inner`, allowing up to `max_attempts` tries in total.
    pub fn new(inner: T, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt`, without jitter.
    fn base_backoff(&self, attempt: usize) -> Duration {
        self.base_delay
            .saturating_mul(1 << (attempt - 1).min(16))
            .min(self.max_delay)
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let jitter_ms: u64 = rng().random_range(0..=MAX_JITTER_MS);
        self.base_backoff(attempt) + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for Retry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> FetchBackend for Retry<T>
where
    T: FetchBackend,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Every attempt running out its timeout plus the longest possible backoffs.
    fn time_budget(&self, timeout: Duration) -> Duration {
        let per_attempt = self.inner.time_budget(timeout);
        let backoffs: Duration = (1..self.max_attempts)
            .map(|attempt| self.base_backoff(attempt) + Duration::from_millis(MAX_JITTER_MS))
            .sum();
        per_attempt.saturating_mul(self.max_attempts as u32) + backoffs
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchFailure> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url, timeout).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !e.is_transient() {
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with the given failure for the first `failures` calls.
    struct Flaky {
        failures: usize,
        failure: FetchFailure,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FetchBackend for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<String, FetchFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.failure.clone())
            } else {
                Ok("page".to_string())
            }
        }
    }

    fn flaky(failures: usize, failure: FetchFailure) -> Flaky {
        Flaky {
            failures,
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let retry = Retry::new(flaky(1, FetchFailure::HttpStatus { code: 401 }), 2)
            .with_base_delay(Duration::from_millis(1));
        let body = retry.fetch("https://site.test", Duration::from_secs(1)).await;
        assert_eq!(body.unwrap(), "page");
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let retry = Retry::new(flaky(5, FetchFailure::Network("reset".into())), 3)
            .with_base_delay(Duration::from_millis(1));
        let err = retry
            .fetch("https://site.test", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, FetchFailure::Network("reset".into()));
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let retry = Retry::new(flaky(5, FetchFailure::HttpStatus { code: 404 }), 3)
            .with_base_delay(Duration::from_millis(1));
        assert!(retry.fetch("https://site.test", Duration::from_secs(1)).await.is_err());
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = Retry::new(flaky(0, FetchFailure::Timeout(1)), 10);
        let delay = retry.backoff(9);
        assert!(delay <= Duration::from_secs(4) + Duration::from_millis(250));
    }

    #[test]
    fn test_time_budget_covers_every_attempt() {
        let retry = Retry::new(flaky(0, FetchFailure::Timeout(1)), 3);
        // 3 x 20s plus backoffs of 0.5s and 1s, each with up to 250ms jitter.
        assert_eq!(
            retry.time_budget(Duration::from_secs(20)),
            Duration::from_millis(60_000 + 750 + 1_250)
        );
        let single = Retry::new(flaky(0, FetchFailure::Timeout(1)), 1);
        assert_eq!(single.time_budget(Duration::from_secs(20)), Duration::from_secs(20));
    }
}
