//! Headless-browser fetch backend (requires the `headless` feature).
//!
//! Launches a fresh Chrome per call, navigates, waits for the page to settle
//! and returns the rendered DOM. The browser process and its CDP handler task
//! are torn down before returning, on success and on failure alike.

use super::FetchBackend;
use crate::config::FetchSettings;
use crate::error::FetchFailure;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    settle: Duration,
    user_agent: String,
}

impl HeadlessBackend {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            settle: Duration::from_millis(settings.settle_ms),
            user_agent: settings.user_agent.clone(),
        }
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<String, FetchFailure> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchFailure::Backend(format!("new page: {e}")))?;
        page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| FetchFailure::Backend(format!("set user agent: {e}")))?;
        page.goto(url)
            .await
            .map_err(|e| FetchFailure::Network(format!("navigate: {e}")))?;
        if let Err(e) = page.wait_for_navigation().await {
            debug!(error = %e, "Navigation wait failed; taking content anyway");
        }
        tokio::time::sleep(self.settle).await;
        page.content()
            .await
            .map_err(|e| FetchFailure::Backend(format!("read content: {e}")))
    }
}

#[async_trait]
impl FetchBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchFailure> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .build()
            .map_err(FetchFailure::Backend)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchFailure::Backend(format!("launch: {e}")))?;
        let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let outcome = match tokio::time::timeout(timeout, self.render(&browser, url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchFailure::Timeout(timeout.as_secs())),
        };

        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        let _ = browser.wait().await;
        handle.abort();

        outcome
    }
}
