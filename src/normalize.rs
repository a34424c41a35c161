//! Candidate cleanup: text, URLs, length filters and per-source deduplication.
//!
//! [`normalize`] is a fixed point: feeding its output back in (via
//! `Candidate::from(NewsItem)`) returns the same list.

use crate::config::Settings;
use crate::extract::html::is_boilerplate;
use crate::models::{Candidate, NewsItem, SourceSpec};
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Query keys dropped outright; `utm_*` and `at_*` are matched by prefix.
const TRACKING_KEYS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "yclid", "igshid", "_ga",
];

static TRAILING_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-–—•·|:]+$").unwrap());

/// Filtering limits applied by [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    pub min_title_len: usize,
    /// Longer "titles" are paragraphs or teaser blocks, not headlines.
    pub max_title_chars: usize,
    pub max_summary_chars: usize,
    pub max_items: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_title_len: 15,
            max_title_chars: 220,
            max_summary_chars: 300,
            max_items: 120,
        }
    }
}

impl Rules {
    /// Rules for `spec`: the configured defaults with its minimum title length override.
    pub fn for_source(settings: &Settings, spec: &SourceSpec) -> Self {
        Self {
            min_title_len: settings.min_title_len(spec),
            max_items: settings.aggregate.max_items_per_source,
            ..Self::default()
        }
    }
}

/// Collapse whitespace and strip trailing separators (dashes, bullets, pipes, colons).
///
/// # Arguments
///
/// * `raw` - Text as it came out of the document
///
/// # Returns
///
/// The cleaned text; empty when nothing but whitespace and separators was left.
pub fn clean_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    TRAILING_SEPARATORS.replace(&collapsed, "").into_owned()
}

fn is_tracking_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || key.starts_with("at_") || TRACKING_KEYS.contains(&key.as_str())
}

/// Drop tracking query parameters and the fragment.
///
/// The query is only re-encoded when a parameter was actually removed.
pub fn strip_tracking(mut url: Url) -> Url {
    url.set_fragment(None);
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_key(k)).collect();
    if kept.len() == pairs.len() {
        if url.query() == Some("") {
            url.set_query(None);
        }
        return url;
    }
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    url
}

/// Resolve `href` against `base` into an absolute, tracking-free http(s) URL.
///
/// # Arguments
///
/// * `base` - The source endpoint the link was found on
/// * `href` - Relative, protocol-relative or absolute link
///
/// # Returns
///
/// The canonical URL, or `None` when the link does not resolve to http(s).
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let url = match href.strip_prefix("//") {
        Some(rest) => Url::parse(&format!("https://{rest}")).ok()?,
        None => base.join(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(strip_tracking(url).to_string())
}

/// Turn raw candidates into news items for one source.
///
/// Items keep document order. Within the source an item is dropped when its
/// lower-cased title or its canonical URL was already seen; the first
/// occurrence wins.
///
/// # Arguments
///
/// * `candidates` - Extractor output, in document order
/// * `spec` - The source the candidates came from (name and base URL)
/// * `rules` - Length limits and the per-source item cap
///
/// # Returns
///
/// At most `rules.max_items` items with clean titles, absolute URLs and cut
/// summaries. Running it again over its own output changes nothing.
pub fn normalize(candidates: Vec<Candidate>, spec: &SourceSpec, rules: &Rules) -> Vec<NewsItem> {
    let base = match Url::parse(&spec.endpoint) {
        Ok(base) => base,
        Err(e) => {
            warn!(source = %spec.name, error = %e, "Source endpoint is not a URL");
            return Vec::new();
        }
    };

    let total = candidates.len();
    let mut titles = HashSet::new();
    let mut urls = HashSet::new();
    let mut out = Vec::new();

    for candidate in candidates {
        if out.len() >= rules.max_items {
            break;
        }
        let title = clean_text(&candidate.title);
        let len = title.chars().count();
        if len < rules.min_title_len || len > rules.max_title_chars || is_boilerplate(&title) {
            continue;
        }
        let Some(url) = resolve_url(&base, &candidate.href) else {
            continue;
        };
        if titles.contains(&title.to_lowercase()) || urls.contains(&url) {
            continue;
        }
        titles.insert(title.to_lowercase());
        urls.insert(url.clone());

        let summary = candidate
            .summary
            .map(|s| truncate_chars(&clean_text(&s), rules.max_summary_chars))
            .filter(|s| !s.is_empty() && *s != title);
        let published = candidate
            .published
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        out.push(NewsItem {
            title,
            url,
            source: spec.name.clone(),
            summary,
            published,
        });
    }

    debug!(
        source = %spec.name,
        candidates = total,
        kept = out.len(),
        "Normalized candidates"
    );
    out
}

impl From<NewsItem> for Candidate {
    fn from(item: NewsItem) -> Self {
        Candidate {
            title: item.title,
            href: item.url,
            summary: item.summary,
            published: item.published,
        }
    }
}
