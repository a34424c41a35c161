//! Small helpers for string truncation and file system preparation.
//!
//! - Character-safe truncation for log lines and delivered text
//! - JSON error classification for half-written snapshot files
//! - Parent directory creation before the snapshot is written

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped bytes appended. Cuts always land on a character boundary.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Cut `s` to at most `max` characters, ending in `…` when anything was removed.
///
/// Applying it twice gives the same result as applying it once.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let kept: String = s.chars().take(max - 1).collect();
    format!("{}…", kept.trim_end())
}

/// Create the directory that will hold `path`, if it has one.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).await?;
            debug!(dir = %dir.display(), "Snapshot directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "Економічна правда".repeat(10);
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("Еконо…"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        let cut = truncate_chars("one two three four", 9);
        assert_eq!(cut, "one two…");
        assert!(cut.chars().count() <= 9);
        assert_eq!(truncate_chars(&cut, 9), cut);
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_nested() {
        let root = std::env::temp_dir().join(format!("hd_utils_{}", std::process::id()));
        let file = root.join("a/b/news_cache.json");
        ensure_parent_dir(&file).await.unwrap();
        assert!(root.join("a/b").is_dir());
        let _ = std::fs::remove_dir_all(&root);

        ensure_parent_dir(Path::new("news_cache.json")).await.unwrap();
    }
}
