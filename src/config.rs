//! Runtime settings.
//!
//! All settings have defaults so the binary runs without a config file. When a
//! YAML file is given, any section it contains replaces the default for that
//! section; missing fields inside a section fall back to their defaults.
//!
//! ```yaml
//! fetch:
//!   timeout_secs: 15
//!   adaptive: true
//! cache:
//!   path: /var/lib/headline_digest/news_cache.json
//!   refresh_interval_secs: 3600
//! sources:
//!   - name: Reuters (Markets)
//!     endpoint: https://www.reuters.com/markets
//!     kind: reuters
//! ```

use crate::error::ConfigError;
use crate::models::{ExtractorKind, SourceSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Upper bound on the source table size.
pub const MAX_SOURCES: usize = 15;

/// Browser-like user agent sent by the HTTP backends.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub sources: Vec<SourceSpec>,
    pub fetch: FetchSettings,
    pub aggregate: AggregateSettings,
    pub cache: CacheSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Per-backend request timeout.
    pub timeout_secs: u64,
    /// Escalate to heavier backends when the light one returns a block page.
    pub adaptive: bool,
    /// Attempts per backend before moving on.
    pub max_attempts: usize,
    /// Bodies shorter than this are treated as blocked in adaptive mode.
    pub min_body_len: usize,
    /// How much of the body is scanned for block-page markers.
    pub block_scan_chars: usize,
    /// Settle delay for the rendering backend after navigation.
    pub settle_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregateSettings {
    /// Wall-clock bound on one aggregation run.
    pub global_timeout_secs: u64,
    /// Bound on one source's fetch, extract and normalize pipeline. Raised to
    /// the fetch chain's worst case (every backend and retry) when that is longer.
    pub source_timeout_secs: u64,
    /// How many source pipelines run at once.
    pub concurrency: usize,
    pub max_items_per_source: usize,
    /// Default minimum title length, overridable per source.
    pub min_title_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub path: String,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Maximum characters per delivered text block.
    pub message_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            fetch: FetchSettings::default(),
            aggregate: AggregateSettings::default(),
            cache: CacheSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            adaptive: true,
            max_attempts: 2,
            min_body_len: 1500,
            block_scan_chars: 1000,
            settle_ms: 2000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            global_timeout_secs: 60,
            source_timeout_secs: 45,
            concurrency: 10,
            max_items_per_source: 120,
            min_title_len: 15,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: "news_cache.json".to_string(),
            refresh_interval_secs: 3600,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            message_limit: 4000,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AggregateSettings {
    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl CacheSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Settings {
    /// Load settings from a YAML file and validate them.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_yaml(&raw)?;
        info!(sources = settings.sources.len(), "Loaded configuration");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Effective minimum title length for a source.
    pub fn min_title_len(&self, spec: &SourceSpec) -> usize {
        spec.min_title_len.unwrap_or(self.aggregate.min_title_len)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".into()));
        }
        if self.sources.len() > MAX_SOURCES {
            return Err(ConfigError::Invalid(format!(
                "{} sources configured, at most {MAX_SOURCES} allowed",
                self.sources.len()
            )));
        }
        for spec in &self.sources {
            let url = Url::parse(&spec.endpoint).map_err(|e| {
                ConfigError::Invalid(format!("source {:?}: bad endpoint: {e}", spec.name))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "source {:?}: endpoint must be http(s)",
                    spec.name
                )));
            }
        }
        if self.fetch.timeout_secs == 0
            || self.aggregate.global_timeout_secs == 0
            || self.aggregate.source_timeout_secs == 0
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.output.message_limit < 200 {
            return Err(ConfigError::Invalid(
                "output.message_limit must be at least 200".into(),
            ));
        }
        Ok(())
    }
}

/// The built-in source table.
pub fn default_sources() -> Vec<SourceSpec> {
    use ExtractorKind::*;
    vec![
        SourceSpec::new("Epravda (Finances)", "https://epravda.com.ua/finances", Epravda),
        SourceSpec::new("Epravda (Columns)", "https://epravda.com.ua/columns", Epravda),
        SourceSpec::new("Reuters (Business)", "https://www.reuters.com/business", Reuters),
        SourceSpec::new("Reuters (Markets)", "https://www.reuters.com/markets", Reuters),
        SourceSpec::new("Reuters (Technology)", "https://www.reuters.com/technology", Reuters),
        SourceSpec::new("FT (Companies)", "https://www.ft.com/companies", FinancialTimes),
        SourceSpec::new("FT (Technology)", "https://www.ft.com/technology", FinancialTimes),
        SourceSpec::new("FT (Markets)", "https://www.ft.com/markets", FinancialTimes),
        SourceSpec::new("FT (Opinion)", "https://www.ft.com/opinion", FinancialTimes),
        SourceSpec::new("FT (Headlines)", "https://www.ft.com/?format=rss", Feed),
        SourceSpec::new("BBC (Business)", "https://www.bbc.com/business", Bbc),
        SourceSpec {
            min_title_len: Some(12),
            ..SourceSpec::new("Bloomberg", "https://www.bloomberg.com/", Bloomberg)
        },
    ]
}
