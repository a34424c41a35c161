//! Generic HTML heuristics shared by the per-site strategy lists.
//!
//! Each function here looks at a parsed [`Page`] and returns candidates in
//! document order. All of them run the same acceptance filter
//! ([`Page::accept`]): non-article paths, static assets, off-site links and
//! boilerplate link text never become candidates.

use crate::models::Candidate;
use crate::normalize::clean_text;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Candidates shorter than this (after whitespace cleanup) never leave the extractor.
pub const MIN_CANDIDATE_CHARS: usize = 10;

/// Minimum length for a nearby paragraph to count as a summary.
const MIN_SUMMARY_CHARS: usize = 20;

/// Path segments that mark navigation, account or media pages rather than articles.
const DENIED_SEGMENTS: &[&str] = &[
    "about", "privacy", "cookies", "terms", "contact", "help", "faq", "signup", "login",
    "signin", "subscribe", "subscription", "newsletters", "account", "advert", "advertising",
    "policy", "store", "shop", "sitemap", "live", "video", "videos", "watch-live", "audio",
    "podcasts", "weather", "sport", "travel", "culture", "reel", "usingthebbc", "mediakit",
    "press-release", "aboutthebbc", "author", "authors", "tag", "tags", "topics",
];

const ASSET_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".mp3", ".mp4",
    ".mov", ".m3u8", ".pdf",
];

/// Link text that is never a headline, compared case-insensitively.
const BOILERPLATE: &[&str] = &[
    "subscribe",
    "read more",
    "more from this issue",
    "sign in",
    "sign up",
    "log in",
    "cookies",
    "privacy",
    "terms",
    "terms of use",
    "skip to content",
    "skip to main content",
    "see all",
    "view all",
    "show more",
    "load more",
];

static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));
static STRUCTURAL: Lazy<Selector> = Lazy::new(|| {
    selector(
        r#"article, [itemprop="headline"], [data-testid*="headline"], [data-testid*="Heading"], [data-component="headline"]"#,
    )
});
static SUBHEADING: Lazy<Selector> = Lazy::new(|| selector("h2, h3"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

/// Generic "looks like a real article" path: a news/article segment, a dated
/// path, or a long numeric id.
pub static ARTICLE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)/(news|article|articles|story|stories|content)/|/\d{4}/\d{1,2}/\d{1,2}/|\d{4}-\d{2}-\d{2}|[-_/]\d{6,}(\.html?)?/?$",
    )
    .unwrap()
});

/// Parse a selector that is known to be valid.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

/// A parsed document plus what is needed to judge its links.
pub struct Page {
    pub doc: Html,
    pub base: Url,
    hosts: &'static [&'static str],
}

impl Page {
    /// `hosts` pins links to these host suffixes; empty means any host.
    pub fn parse(raw: &str, base: Url, hosts: &'static [&'static str]) -> Self {
        Self {
            doc: Html::parse_document(raw),
            base,
            hosts,
        }
    }

    fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        let url = if let Some(rest) = href.strip_prefix("//") {
            Url::parse(&format!("https://{rest}")).ok()?
        } else {
            self.base.join(href).ok()?
        };
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    fn on_site(&self, url: &Url) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        let host = url.host_str().unwrap_or_default();
        self.hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    }

    /// Whether an `(href, text)` pair can be a headline link at all.
    pub fn accept(&self, href: &str, text: &str) -> bool {
        let lower = href.trim().to_ascii_lowercase();
        if lower.is_empty()
            || lower.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            return false;
        }
        let Some(url) = self.resolve(href) else {
            return false;
        };
        if !self.on_site(&url) || is_denied_path(url.path()) {
            return false;
        }
        text.chars().count() >= MIN_CANDIDATE_CHARS && !is_boilerplate(text)
    }

    /// Resolved path of `href`, used by link-shape patterns.
    pub fn path_of(&self, href: &str) -> Option<String> {
        self.resolve(href).map(|u| u.path().to_string())
    }
}

pub fn is_denied_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return true;
    }
    lower
        .split('/')
        .filter(|s| !s.is_empty())
        .any(|seg| DENIED_SEGMENTS.contains(&seg))
}

pub fn is_boilerplate(text: &str) -> bool {
    let lower = text.trim().trim_end_matches([':', '.', '…']).to_lowercase();
    BOILERPLATE.iter().any(|b| lower == *b)
        || lower.starts_with("more from this issue")
        || lower.starts_with("sign in to")
}

pub fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_link(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if el.value().name() == "a" && el.value().attr("href").is_some() {
        return Some(el);
    }
    el.select(&ANCHOR).next()
}

fn enclosing_link(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
}

/// First paragraph of reasonable length within `el` or up to two ancestors above it.
pub fn nearby_summary(el: ElementRef<'_>, headline: &str) -> Option<String> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap).take(2))
        .flat_map(|scope| scope.select(&PARAGRAPH).take(3).collect::<Vec<_>>())
        .map(element_text)
        .find(|p| p.chars().count() >= MIN_SUMMARY_CHARS && p != headline)
}

/// Collects candidates, keeping the first one per href.
pub struct Collector<'p> {
    page: &'p Page,
    seen: HashSet<String>,
    out: Vec<Candidate>,
}

impl<'p> Collector<'p> {
    pub fn new(page: &'p Page) -> Self {
        Self {
            page,
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    pub fn push(&mut self, href: &str, title: String, summary: Option<String>) {
        if !self.page.accept(href, &title) {
            return;
        }
        if self.seen.insert(href.trim().to_string()) {
            self.out
                .push(Candidate::new(title, href.trim()).with_summary(summary));
        }
    }

    pub fn finish(self) -> Vec<Candidate> {
        self.out
    }
}

/// Tier 1: `article` elements or headline-tagged elements that hold a heading
/// with a link.
pub fn structural(page: &Page) -> Vec<Candidate> {
    let mut collector = Collector::new(page);
    for container in page.doc.select(&STRUCTURAL) {
        let (title_el, link) = if container.value().name() == "article" {
            let Some(heading) = container.select(&HEADING).next() else {
                continue;
            };
            let link = first_link(heading)
                .or_else(|| enclosing_link(heading))
                .or_else(|| first_link(container));
            (heading, link)
        } else {
            (
                container,
                first_link(container).or_else(|| enclosing_link(container)),
            )
        };
        let Some(link) = link else { continue };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = element_text(title_el);
        let summary = nearby_summary(container, &title);
        collector.push(href, title, summary);
    }
    collector.finish()
}

/// Tier 2: links whose resolved path matches `pattern`.
pub fn links_matching(page: &Page, pattern: &Regex) -> Vec<Candidate> {
    let mut collector = Collector::new(page);
    for a in page.doc.select(&ANCHOR) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some(path) = page.path_of(href) else {
            continue;
        };
        if !pattern.is_match(&path) {
            continue;
        }
        let title = element_text(a);
        let summary = nearby_summary(a, &title);
        collector.push(href, title, summary);
    }
    collector.finish()
}

/// Links picked out by site-specific card selectors. A matched element that is
/// not itself a link contributes its first nested link.
pub fn cards(page: &Page, css: &Selector) -> Vec<Candidate> {
    let mut collector = Collector::new(page);
    for node in page.doc.select(css) {
        let Some(a) = first_link(node).or_else(|| enclosing_link(node)) else {
            continue;
        };
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let title = element_text(a);
        let summary = nearby_summary(node, &title);
        collector.push(href, title, summary);
    }
    collector.finish()
}

/// Tier 3: any `h2`/`h3`. Headings without a link point at the page itself,
/// so at most the first of them survives the per-link dedup.
pub fn headings(page: &Page) -> Vec<Candidate> {
    let mut collector = Collector::new(page);
    let base = page.base.to_string();
    for heading in page.doc.select(&SUBHEADING) {
        let title = element_text(heading);
        let href = first_link(heading)
            .or_else(|| enclosing_link(heading))
            .and_then(|a| a.value().attr("href"))
            .unwrap_or(base.as_str())
            .to_string();
        collector.push(&href, title, None);
    }
    collector.finish()
}

/// Tier 4: `og:title`, then `<title>`, pointing at the page itself.
pub fn page_title(page: &Page) -> Vec<Candidate> {
    let base = page.base.to_string();
    let mut out: Vec<Candidate> = Vec::new();
    let og = page
        .doc
        .select(&OG_TITLE)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(clean_text);
    let title = page.doc.select(&TITLE).next().map(element_text);
    for text in [og, title].into_iter().flatten() {
        if !text.is_empty() && out.iter().all(|c| c.title != text) {
            out.push(Candidate::new(text, base.clone()));
        }
    }
    out
}
