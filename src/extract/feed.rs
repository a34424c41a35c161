//! RSS 2.0 / Atom feed extractor.
//!
//! Walks the document with `quick-xml`'s event reader and collects one
//! [`Candidate`] per `item` (RSS) or `entry` (Atom). Missing fields are left
//! empty rather than failing the parse; entries without a title or link are
//! skipped. Embedded HTML in descriptions is reduced to text.

use crate::error::ExtractionFailure;
use crate::models::Candidate;
use crate::normalize::clean_text;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::borrow::Cow;
use tracing::debug;

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

#[derive(Default)]
struct Entry {
    title: String,
    link: String,
    summary: String,
    content: String,
    published: String,
    updated: String,
}

impl Entry {
    fn into_candidate(self) -> Option<Candidate> {
        let title = clean_text(&self.title);
        let link = self.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            return None;
        }
        let body = if self.summary.trim().is_empty() {
            &self.content
        } else {
            &self.summary
        };
        let summary = clean_text(&TAGS.replace_all(body, " "));
        let published = if self.published.trim().is_empty() {
            self.updated.trim().to_string()
        } else {
            self.published.trim().to_string()
        };
        Some(Candidate {
            title,
            href: link,
            summary: (!summary.is_empty()).then_some(summary),
            published: (!published.is_empty()).then_some(published),
        })
    }

    fn field(&mut self, element: &str) -> Option<&mut String> {
        match element {
            "title" => Some(&mut self.title),
            "link" => Some(&mut self.link),
            "description" | "summary" => Some(&mut self.summary),
            // Full content is only used when there is no shorter summary.
            "content" | "encoded" => Some(&mut self.content),
            "pubDate" | "published" | "date" => Some(&mut self.published),
            "updated" => Some(&mut self.updated),
            _ => None,
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Atom `<link href="..."/>`: only the alternate (or unqualified) link counts.
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().ok()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href,
        _ => None,
    }
}

fn malformed(raw: &str, reason: impl Into<String>) -> ExtractionFailure {
    ExtractionFailure::Malformed {
        format: "feed",
        bytes: raw.len(),
        reason: reason.into(),
    }
}

/// Parse a feed document into candidates, in document order.
pub fn parse_feed(raw: &str) -> Result<Vec<Candidate>, ExtractionFailure> {
    if raw.trim().is_empty() {
        return Err(ExtractionFailure::Empty);
    }

    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    // Depth of the open item/entry element, if any.
    let mut entry_depth: Option<usize> = None;
    let mut entry = Entry::default();
    let mut out = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if stack.is_empty() {
                    saw_root = matches!(name.as_str(), "rss" | "feed" | "RDF");
                }
                if entry_depth.is_none() && (name == "item" || name == "entry") {
                    entry_depth = Some(stack.len());
                    entry = Entry::default();
                } else if entry_depth == Some(stack.len().saturating_sub(1)) && name == "link" {
                    if let Some(href) = atom_href(&e) {
                        entry.link = href;
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                if entry_depth == Some(stack.len().saturating_sub(1))
                    && local_name(&e) == "link"
                    && entry.link.is_empty()
                {
                    if let Some(href) = atom_href(&e) {
                        entry.link = href;
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if entry_depth == Some(stack.len()) {
                    entry_depth = None;
                    if let Some(candidate) = std::mem::take(&mut entry).into_candidate() {
                        out.push(candidate);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = direct_child_field(&stack, entry_depth, &mut entry) {
                    let text = t.unescape().unwrap_or_else(|e| {
                        debug!(error = %e, "Unescape failed; keeping raw text");
                        Cow::Owned(String::from_utf8_lossy(&t).into_owned())
                    });
                    field.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(field) = direct_child_field(&stack, entry_depth, &mut entry) {
                    field.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(malformed(
                    raw,
                    format!("at byte {}: {e}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(malformed(raw, "no rss, feed or RDF root element"));
    }
    debug!(entries = out.len(), "Parsed feed");
    Ok(out)
}

/// The entry field for text directly inside an item/entry child element.
fn direct_child_field<'e>(
    stack: &[String],
    entry_depth: Option<usize>,
    entry: &'e mut Entry,
) -> Option<&'e mut String> {
    let depth = entry_depth?;
    if stack.len() != depth + 2 {
        return None;
    }
    entry.field(stack.last()?)
}
