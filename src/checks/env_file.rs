//! Minimal `.env` file support.
//!
//! Only the subset used by deployment files is understood: one `KEY=VALUE`
//! pair per line, `#` comment lines, and values optionally wrapped in single
//! or double quotes. Nothing is exported to the process environment.

use std::{collections::HashMap, io, path::Path};

/// Parses the content of a `.env` file.
///
/// Lines without `=` are ignored. Values keep any `=` after the first one.
pub fn parse_env(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), unquote(value.trim()).to_owned()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && (value.starts_with('"') || value.starts_with('\''))
        && (value.ends_with('"') || value.ends_with('\''));
    if quoted { &value[1..value.len() - 1] } else { value }
}

/// Reads and parses a `.env` file.
///
/// Returns `Ok(None)` if the file does not exist.
pub async fn load_env_file(path: &Path) -> io::Result<Option<HashMap<String, String>>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(parse_env(&content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_env_pairs_and_comments() {
        let env = parse_env("# deployment\nSESSION_ID=abc\n\n  DATABASE_URL = sqlite://events.db  \n");

        assert_eq!(env.len(), 2);
        assert_eq!(env["SESSION_ID"], "abc");
        assert_eq!(env["DATABASE_URL"], "sqlite://events.db");
    }

    #[test]
    fn test_parse_env_strips_quotes() {
        let env = parse_env("A=\"double\"\nB='single'\nC=\"\"\nD=\"");

        assert_eq!(env["A"], "double");
        assert_eq!(env["B"], "single");
        assert_eq!(env["C"], "");
        assert_eq!(env["D"], "\"");
    }

    #[test]
    fn test_parse_env_keeps_extra_equal_signs() {
        let env = parse_env("SESSION_ID=abc==\n");

        assert_eq!(env["SESSION_ID"], "abc==");
    }

    #[test]
    fn test_parse_env_ignores_invalid_lines() {
        let env = parse_env("not a pair\n=value\n");

        assert!(env.is_empty());
    }

    #[tokio::test]
    async fn test_load_env_file_missing() {
        let dir = TempDir::new().unwrap();

        assert_eq!(load_env_file(&dir.path().join(".env")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "SESSION_ID=abc\n").unwrap();

        let env = load_env_file(&path).await.unwrap().unwrap();

        assert_eq!(env["SESSION_ID"], "abc");
    }
}
