//! Utility functions for text and path handling.
//!
//! This module provides helpers shared by the operational checks for
//! locating matches in files and displaying them.

use std::path::Path;

/// Returns the 1-based line number of a byte offset in `content`.
///
/// Offsets past the end of `content` are clamped to its length.
///
/// # Examples
///
/// ```
/// # use goodchild::utils::line_of_offset;
/// assert_eq!(line_of_offset("a\nb\nc", 4), 3);
/// ```
pub fn line_of_offset(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content.as_bytes()[..offset]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count()
        + 1
}

/// Truncates `text` to at most `max_chars` characters, appending `...` when
/// something was cut.
///
/// Truncation counts characters, not bytes, so multi-byte text is never
/// split inside a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_owned(),
    }
}

/// Returns `path` relative to `root` for display, or `path` itself if it is
/// not inside `root`.
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_line_of_offset_first_line() {
        assert_eq!(line_of_offset("let a = 1;", 0), 1);
        assert_eq!(line_of_offset("let a = 1;", 5), 1);
    }

    #[test]
    fn test_line_of_offset_after_newlines() {
        let content = "first\nsecond\nthird";

        assert_eq!(line_of_offset(content, content.find("second").unwrap()), 2);
        assert_eq!(line_of_offset(content, content.find("third").unwrap()), 3);
    }

    #[test]
    fn test_line_of_offset_past_end() {
        assert_eq!(line_of_offset("a\nb", 100), 2);
    }

    #[test]
    fn test_truncate_chars_short_text() {
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_truncate_chars_exact_length() {
        let text = "a".repeat(100);

        assert_eq!(truncate_chars(&text, 100), text);
    }

    #[test]
    fn test_truncate_chars_long_text() {
        let text = "a".repeat(150);

        let truncated = truncate_chars(&text, 100);

        assert_eq!(truncated.len(), 103);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("ééé", 2), "éé...");
    }

    #[test]
    fn test_display_path() {
        let root = PathBuf::from("/srv/bot");

        assert_eq!(display_path(&root, &root.join("src/main.rs")), "src/main.rs");
        assert_eq!(display_path(&root, Path::new("/etc/hosts")), "/etc/hosts");
    }
}
