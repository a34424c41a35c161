//! HTTP fetch backends built on `reqwest`.
//!
//! Two profiles share one implementation:
//!
//! - **plain**: browser user agent and a minimal `Accept-Language`
//! - **hardened**: the full header set a desktop Chrome sends on a top-level
//!   navigation, a Google referer and a cookie jar, which gets past the 401/403
//!   that some sites return to bare clients

use super::FetchBackend;
use crate::config::FetchSettings;
use crate::error::FetchFailure;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

pub struct HttpBackend {
    name: &'static str,
    client: Client,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend").field("name", &self.name).finish()
    }
}

impl HttpBackend {
    /// Lightweight client: user agent plus language preference.
    pub fn plain(settings: &FetchSettings) -> Result<Self, FetchFailure> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en,uk;q=0.8"),
        );
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()
            .map_err(|e| FetchFailure::Backend(e.to_string()))?;
        Ok(Self {
            name: "http",
            client,
        })
    }

    /// Browser-profile client with cookies and navigation headers.
    pub fn hardened(settings: &FetchSettings) -> Result<Self, FetchFailure> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(browser_headers())
            .cookie_store(true)
            .timeout(settings.timeout())
            .build()
            .map_err(|e| FetchFailure::Backend(e.to_string()))?;
        Ok(Self {
            name: "http-hardened",
            client,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,uk;q=0.8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::REFERER,
        HeaderValue::from_static("https://www.google.com/"),
    );
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(
            "\"Chromium\";v=\"129\", \"Not=A?Brand\";v=\"8\", \"Google Chrome\";v=\"129\"",
        ),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"macOS\""));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers
}

#[async_trait]
impl FetchBackend for HttpBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchFailure> {
        let t0 = Instant::now();
        let secs = timeout.as_secs();
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchFailure::from_reqwest(e, secs))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus {
                code: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchFailure::from_reqwest(e, secs))?;
        debug!(
            backend = self.name,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "HTTP fetch complete"
        );
        Ok(body)
    }
}
