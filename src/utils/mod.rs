//! Utility functions and helpers

use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Normalize line endings to `\n` so output is stable across platforms
pub fn normalize_line_endings(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            result.push('\n');
        } else {
            result.push(c);
        }
    }

    result
}

/// Write `content` to `path`, creating parent directories as needed
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Sibling path carrying the fixed minified suffix: `style.css` -> `style.min.css`
pub fn min_sibling(path: &Path) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.min.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hash_content() {
        let hash = hash_content(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, hash_content(b"hello world"));
        assert_ne!(hash, hash_content(b"hello worlds"));
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(normalize_line_endings("no endings"), "no endings");
        assert_eq!(normalize_line_endings("trailing\r\n"), "trailing\n");
    }

    #[test]
    fn test_min_sibling() {
        assert_eq!(
            min_sibling(Path::new("assets/css/style.css")),
            Path::new("assets/css/style.min.css")
        );
        assert_eq!(
            min_sibling(Path::new("main.js")),
            Path::new("main.min.js")
        );
    }

}
