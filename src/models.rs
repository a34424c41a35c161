//! Data models for sources, extracted headlines and aggregation results.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`SourceSpec`]: One configured origin (a section of a site or a feed)
//! - [`Candidate`]: An unvalidated `(title, href)` pair straight out of an extractor
//! - [`NewsItem`]: A normalized headline ready for delivery
//! - [`AggregationResult`]: The outcome of one aggregation run
//! - [`Snapshot`]: The persisted form of the latest result
//!
//! The snapshot uses `link` / `pubDate` / `articles` on the wire to stay
//! compatible with the cache files consumers already read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which extraction family handles a source's documents.
///
/// Each HTML kind maps to an ordered list of strategies in
/// [`crate::extract::registry`]; `Feed` goes through the RSS/Atom parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// RSS 2.0 or Atom document.
    Feed,
    /// Reuters section pages.
    Reuters,
    /// Financial Times section pages.
    FinancialTimes,
    /// BBC section pages.
    Bbc,
    /// Ekonomichna Pravda (epravda.com.ua) section pages.
    Epravda,
    /// Bloomberg home page; usually needs the rendering backend.
    Bloomberg,
    /// Any other HTML page.
    Generic,
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractorKind::Feed => "feed",
            ExtractorKind::Reuters => "reuters",
            ExtractorKind::FinancialTimes => "financial_times",
            ExtractorKind::Bbc => "bbc",
            ExtractorKind::Epravda => "epravda",
            ExtractorKind::Bloomberg => "bloomberg",
            ExtractorKind::Generic => "generic",
        };
        f.pad(s)
    }
}

/// Static configuration entry for one source.
///
/// Immutable for the lifetime of the process; the full table is small and
/// loaded once at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceSpec {
    /// Display name, also stamped on every item as `source`.
    pub name: String,
    /// Absolute URL of the page or feed.
    pub endpoint: String,
    /// Extraction family used for this source.
    pub kind: ExtractorKind,
    /// Per-source override of the minimum accepted title length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_title_len: Option<usize>,
}

impl SourceSpec {
    pub fn new(name: &str, endpoint: &str, kind: ExtractorKind) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            kind,
            min_title_len: None,
        }
    }
}

/// An extracted headline before normalization.
///
/// `href` may be relative, scheme-relative or absolute; `title` is raw
/// element text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub href: String,
    pub summary: Option<String>,
    pub published: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            summary: None,
            published: None,
        }
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }
}

/// One normalized headline.
///
/// `title` and `url` are never empty and `url` is always absolute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(rename = "link")]
    pub url: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "pubDate", default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

impl NewsItem {
    /// Key used for deduplication: lower-cased title plus canonical URL.
    pub fn dedup_key(&self) -> (String, String) {
        (self.title.to_lowercase(), self.url.clone())
    }
}

/// Result of one aggregation run. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub items: Vec<NewsItem>,
    pub generated_at: DateTime<Utc>,
    /// Sources that failed in this run, keyed by source name.
    pub per_source_errors: BTreeMap<String, String>,
}

impl AggregationResult {
    /// True when at least one source failed but the run as a whole completed.
    pub fn is_partial(&self) -> bool {
        !self.per_source_errors.is_empty()
    }
}

/// The persisted form of the latest aggregation.
///
/// An empty snapshot has no timestamp and no articles; it is what callers get
/// before the first successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Snapshot {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "articles", default)]
    pub items: Vec<NewsItem>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none()
    }
}

impl From<&AggregationResult> for Snapshot {
    fn from(result: &AggregationResult) -> Self {
        Self {
            timestamp: Some(result.generated_at),
            items: result.items.clone(),
        }
    }
}
