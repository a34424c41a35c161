//! Per-site strategy lists.
//!
//! Adding a site means adding an [`ExtractorKind`], its host list and an
//! ordered strategy list here; nothing else branches on the site.

use super::NamedStrategy;
use super::html::{self, ARTICLE_PATH, Page, selector};
use crate::models::{Candidate, ExtractorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

static REUTERS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(business|markets|technology|world|sustainability|legal)/.+-\d{4}-\d{2}-\d{2}/?$")
        .unwrap()
});
static FT_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/content/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}/?$").unwrap()
});
static BBC_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(news|business)/(articles/[a-z0-9]+|[a-z0-9-]+-\d{6,})/?$").unwrap()
});
static EPRAVDA_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(news|finances|columns|biznes|power|tehnologiji|publications)/[^/]*\d{5,}[^/]*/?$")
        .unwrap()
});
static BLOOMBERG_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(news|opinion)/(articles|features)/").unwrap()
});

static FT_CARDS: Lazy<Selector> = Lazy::new(|| {
    selector(r#"a[data-trackable="heading-link"], .o-teaser__heading, .js-teaser-heading-link"#)
});
static EPRAVDA_CARDS: Lazy<Selector> =
    Lazy::new(|| selector(".article__title, .article_title, .article-title, .article-card"));
static REUTERS_CARDS: Lazy<Selector> = Lazy::new(|| {
    selector(r#"[data-testid="Heading"], [data-testid="Title"], [class*="media-story-card__heading"]"#)
});

fn reuters_cards(page: &Page) -> Vec<Candidate> {
    html::cards(page, &REUTERS_CARDS)
}

fn reuters_links(page: &Page) -> Vec<Candidate> {
    html::links_matching(page, &REUTERS_PATH)
}

fn ft_cards(page: &Page) -> Vec<Candidate> {
    html::cards(page, &FT_CARDS)
}

fn ft_links(page: &Page) -> Vec<Candidate> {
    html::links_matching(page, &FT_PATH)
}

fn bbc_links(page: &Page) -> Vec<Candidate> {
    html::links_matching(page, &BBC_PATH)
}

fn epravda_cards(page: &Page) -> Vec<Candidate> {
    html::cards(page, &EPRAVDA_CARDS)
}

fn epravda_links(page: &Page) -> Vec<Candidate> {
    html::links_matching(page, &EPRAVDA_PATH)
}

fn bloomberg_links(page: &Page) -> Vec<Candidate> {
    html::links_matching(page, &BLOOMBERG_PATH)
}

fn generic_links(page: &Page) -> Vec<Candidate> {
    html::links_matching(page, &ARTICLE_PATH)
}

macro_rules! strategies {
    ($($name:literal => $run:path),+ $(,)?) => {
        &[$(NamedStrategy { name: $name, run: $run }),+]
    };
}

const REUTERS: &[NamedStrategy] = strategies![
    "reuters-cards" => reuters_cards,
    "structural" => html::structural,
    "reuters-links" => reuters_links,
    "headings" => html::headings,
];

const FINANCIAL_TIMES: &[NamedStrategy] = strategies![
    "ft-cards" => ft_cards,
    "structural" => html::structural,
    "ft-links" => ft_links,
    "headings" => html::headings,
];

const BBC: &[NamedStrategy] = strategies![
    "structural" => html::structural,
    "bbc-links" => bbc_links,
    "headings" => html::headings,
];

const EPRAVDA: &[NamedStrategy] = strategies![
    "structural" => html::structural,
    "epravda-cards" => epravda_cards,
    "epravda-links" => epravda_links,
    "headings" => html::headings,
];

const BLOOMBERG: &[NamedStrategy] = strategies![
    "structural" => html::structural,
    "bloomberg-links" => bloomberg_links,
    "headings" => html::headings,
];

const GENERIC: &[NamedStrategy] = strategies![
    "structural" => html::structural,
    "article-links" => generic_links,
    "headings" => html::headings,
];

/// Ordered strategies for an HTML source. `Feed` sources have none.
pub fn strategies(kind: ExtractorKind) -> &'static [NamedStrategy] {
    match kind {
        ExtractorKind::Reuters => REUTERS,
        ExtractorKind::FinancialTimes => FINANCIAL_TIMES,
        ExtractorKind::Bbc => BBC,
        ExtractorKind::Epravda => EPRAVDA,
        ExtractorKind::Bloomberg => BLOOMBERG,
        ExtractorKind::Generic => GENERIC,
        ExtractorKind::Feed => &[],
    }
}

/// Host suffixes a site's links must stay within.
pub fn hosts(kind: ExtractorKind) -> &'static [&'static str] {
    match kind {
        ExtractorKind::Reuters => &["reuters.com"],
        ExtractorKind::FinancialTimes => &["ft.com"],
        ExtractorKind::Bbc => &["bbc.com", "bbc.co.uk"],
        ExtractorKind::Epravda => &["epravda.com.ua"],
        ExtractorKind::Bloomberg => &["bloomberg.com"],
        ExtractorKind::Generic | ExtractorKind::Feed => &[],
    }
}
