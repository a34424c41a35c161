//! Source extractors: raw document in, candidate headlines out.
//!
//! Two families live here:
//!
//! | Family | Module | Used for |
//! |--------|--------|----------|
//! | Feed | [`feed`] | RSS 2.0 and Atom documents |
//! | HTML heuristics | [`html`] + [`sites`] | Section pages of news sites |
//!
//! HTML sources run an ordered strategy list from [`registry`]. The first
//! strategy that produces any accepted candidate wins; when every strategy
//! comes back empty the page title is used so that a page which loaded still
//! yields something.
//!
//! Extraction never fails the caller: [`extract`] logs the problem with the
//! source name and byte count and returns an empty list.

pub mod feed;
pub mod html;
pub mod sites;

use crate::error::ExtractionFailure;
use crate::models::{Candidate, ExtractorKind, SourceSpec};
use html::Page;
use tracing::{debug, instrument, warn};
use url::Url;

/// A pure extraction strategy over a parsed page.
pub type Strategy = fn(&Page) -> Vec<Candidate>;

/// A strategy plus the name it is logged under.
#[derive(Clone, Copy)]
pub struct NamedStrategy {
    pub name: &'static str,
    pub run: Strategy,
}

impl std::fmt::Debug for NamedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Ordered strategies for `kind`. Empty for feed sources.
pub fn registry(kind: ExtractorKind) -> &'static [NamedStrategy] {
    sites::strategies(kind)
}

/// Extract candidates, reporting why nothing could be read.
pub fn try_extract(raw: &str, spec: &SourceSpec) -> Result<Vec<Candidate>, ExtractionFailure> {
    if raw.trim().is_empty() {
        return Err(ExtractionFailure::Empty);
    }
    if spec.kind == ExtractorKind::Feed {
        return feed::parse_feed(raw);
    }

    let base = Url::parse(&spec.endpoint).map_err(|e| ExtractionFailure::Malformed {
        format: "html",
        bytes: raw.len(),
        reason: format!("bad base url {:?}: {e}", spec.endpoint),
    })?;
    let page = Page::parse(raw, base, sites::hosts(spec.kind));

    for strategy in registry(spec.kind) {
        let found = (strategy.run)(&page);
        if !found.is_empty() {
            debug!(
                source = %spec.name,
                strategy = strategy.name,
                count = found.len(),
                "Strategy matched"
            );
            return Ok(found);
        }
    }

    let fallback = html::page_title(&page);
    debug!(
        source = %spec.name,
        count = fallback.len(),
        "No strategy matched; using page title"
    );
    Ok(fallback)
}

/// Extract candidates from `raw`. Failures are logged and yield an empty list.
#[instrument(level = "debug", skip_all, fields(source = %spec.name, kind = %spec.kind))]
pub fn extract(raw: &str, spec: &SourceSpec) -> Vec<Candidate> {
    match try_extract(raw, spec) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(
                source = %spec.name,
                bytes = raw.len(),
                error = %e,
                "Extraction failed"
            );
            Vec::new()
        }
    }
}
