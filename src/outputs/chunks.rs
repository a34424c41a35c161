//! Chat-sized text blocks from a list of news items.
//!
//! Items are rendered one per line under a header line for their source,
//! emitted whenever the source changes. Lines are packed into blocks of at
//! most `per_message_limit` characters (Unicode scalar values, not bytes).
//! A group that spills into the next block repeats its header there with a
//! `(cont.)` marker. A single line too long for an empty block is cut to fit.
//!
//! [`format`] returns a lazy iterator; calling it again starts over.

use crate::models::NewsItem;
use crate::utils::truncate_chars;

/// First line of the first block.
pub const DIGEST_HEADER: &str = "📰 Latest business headlines";

/// The only block produced when there is nothing to show.
pub const NO_NEWS: &str = "No news found right now. Every source came back empty; try again later.";

const MAX_SUMMARY_CHARS: usize = 160;

/// Render one item as a single line.
pub fn render_item(item: &NewsItem) -> String {
    match item.summary.as_deref().filter(|s| !s.is_empty()) {
        Some(summary) => format!(
            "• {} — {} ({})",
            item.title,
            truncate_chars(summary, MAX_SUMMARY_CHARS),
            item.url
        ),
        None => format!("• {} ({})", item.title, item.url),
    }
}

/// Chunk `items` into blocks of at most `per_message_limit` characters.
pub fn format(items: &[NewsItem], per_message_limit: usize) -> Blocks<'_> {
    Blocks {
        items,
        limit: per_message_limit.max(1),
        pos: 0,
        started: false,
    }
}

/// Lazy block sequence produced by [`format`].
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    items: &'a [NewsItem],
    limit: usize,
    pos: usize,
    started: bool,
}

/// A block under construction, tracking its length in characters.
struct Block {
    text: String,
    chars: usize,
    lines: usize,
}

impl Block {
    fn new() -> Self {
        Self {
            text: String::new(),
            chars: 0,
            lines: 0,
        }
    }

    fn cost(&self, line: &str) -> usize {
        line.chars().count() + usize::from(self.lines > 0)
    }

    /// Characters needed to append `lines` in order.
    fn cost_of(&self, lines: &[&str]) -> usize {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| l.chars().count() + usize::from(self.lines + i > 0))
            .sum()
    }

    /// Append `line` on its own line. Empty lines are dropped.
    fn push(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.lines > 0 {
            self.text.push('\n');
            self.chars += 1;
        }
        self.text.push_str(line);
        self.chars += line.chars().count();
        self.lines += 1;
    }
}

impl Blocks<'_> {
    fn header_line(&self, text: &str) -> String {
        truncate_chars(text, self.limit / 3)
    }
}

impl Iterator for Blocks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let first = !self.started;
        self.started = true;

        if self.items.is_empty() {
            return first.then(|| truncate_chars(NO_NEWS, self.limit));
        }
        if self.pos >= self.items.len() {
            return None;
        }

        let items = self.items;
        let mut block = Block::new();
        if first {
            block.push(&self.header_line(DIGEST_HEADER));
        }

        let mut group: Option<&str> = None;
        let mut placed = 0usize;
        while let Some(item) = items.get(self.pos) {
            let mut header = None;
            if group != Some(item.source.as_str()) {
                let continued = placed == 0
                    && self.pos > 0
                    && items[self.pos - 1].source == item.source;
                let text = if continued {
                    format!("{} (cont.)", item.source)
                } else {
                    item.source.clone()
                };
                header = Some(self.header_line(&text));
            }

            let line = render_item(item);
            let needed = match header.as_deref() {
                Some(h) => block.cost_of(&[h, &line]),
                None => block.cost_of(&[&line]),
            };
            if block.chars + needed > self.limit {
                if placed > 0 {
                    break;
                }
                // Nothing placed yet: cut the line so the block still advances.
                // The header goes in only if it leaves room for part of the item.
                if let Some(h) = header.as_deref() {
                    if block.chars + block.cost(h) + 1 < self.limit {
                        block.push(h);
                    }
                }
                let room = self.limit.saturating_sub(block.chars + block.cost(""));
                block.push(&truncate_chars(&line, room));
            } else {
                if let Some(h) = header.as_deref() {
                    block.push(h);
                }
                block.push(&line);
            }
            group = Some(item.source.as_str());
            placed += 1;
            self.pos += 1;
        }

        Some(block.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: &str, i: usize) -> NewsItem {
        NewsItem {
            title: format!("Headline number {i} about markets, rates and the wider economy"),
            url: format!("https://news.test/{}/story-{i}", source.to_lowercase()),
            source: source.to_string(),
            summary: (i % 2 == 0).then(|| "A short description of what happened today.".to_string()),
            published: None,
        }
    }

    fn fifty() -> Vec<NewsItem> {
        (0..50)
            .map(|i| item(if i < 20 { "Reuters" } else if i < 35 { "FT" } else { "BBC" }, i))
            .collect()
    }

    fn item_lines(blocks: &[String]) -> Vec<String> {
        blocks
            .iter()
            .flat_map(|b| b.lines())
            .filter(|l| l.starts_with("• "))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_fifty_items_split_within_limit_in_order() {
        let items = fifty();
        let limit = 1000;
        let total: usize = items.iter().map(|i| render_item(i).chars().count() + 1).sum();
        assert!(total > 3 * limit);

        let blocks: Vec<String> = format(&items, limit).collect();
        assert!(blocks.len() >= 3);
        for b in &blocks {
            assert!(b.chars().count() <= limit, "block of {} chars", b.chars().count());
        }
        let expected: Vec<String> = items.iter().map(render_item).collect();
        assert_eq!(item_lines(&blocks), expected);
    }

    #[test]
    fn test_headers_and_continuation() {
        let items = fifty();
        let blocks: Vec<String> = format(&items, 1000).collect();
        assert!(blocks[0].starts_with(DIGEST_HEADER));
        assert!(blocks[0].lines().nth(1) == Some("Reuters"));
        assert!(blocks[1].starts_with("Reuters (cont.)"));
        assert!(blocks.iter().all(|b| !b.ends_with("FT") && !b.ends_with("BBC")));
        let ft_headers = blocks
            .iter()
            .flat_map(|b| b.lines())
            .filter(|l| *l == "FT")
            .count();
        assert_eq!(ft_headers, 1);
    }

    #[test]
    fn test_restartable() {
        let items = fifty();
        let blocks = format(&items, 800);
        let again = blocks.clone();
        assert_eq!(blocks.collect::<Vec<_>>(), again.collect::<Vec<_>>());
        assert_eq!(
            format(&items, 800).count(),
            format(&items, 800).collect::<Vec<_>>().len()
        );
    }

    #[test]
    fn test_empty_yields_single_notice() {
        let blocks: Vec<String> = format(&[], 4000).collect();
        assert_eq!(blocks, vec![NO_NEWS.to_string()]);
    }

    #[test]
    fn test_oversized_line_is_cut() {
        let mut long = item("Site", 0);
        long.title = "x".repeat(600);
        let items = vec![long, item("Site", 1)];
        let blocks: Vec<String> = format(&items, 250).collect();
        assert!(blocks.iter().all(|b| b.chars().count() <= 250));
        assert_eq!(item_lines(&blocks).len(), 2);
    }

    #[test]
    fn test_tiny_limits_never_exceeded() {
        let items = fifty();
        for limit in 1..=60 {
            let blocks: Vec<String> = format(&items, limit).collect();
            assert!(!blocks.is_empty());
            for b in &blocks {
                assert!(b.chars().count() <= limit, "limit={limit} block={b:?}");
            }
        }
    }
}
