//! Binary/text classification.
//!
//! A heuristic: the first [`PREFIX_LEN`] bytes are read and the file is
//! binary if they contain a NUL byte or are not valid UTF-8. Text in other
//! encodings (Latin-1, UTF-16 without NULs in the prefix, …) is reported as
//! binary; that false positive is accepted. Unreadable files are binary so a
//! text diff is never attempted on them.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected.
pub const PREFIX_LEN: usize = 8192;

/// `true` if `path` should be treated as opaque bytes.
pub fn is_binary(path: &Path) -> bool {
    match read_prefix(path) {
        Ok(prefix) => is_binary_bytes(&prefix),
        Err(e) => {
            tracing::debug!("treating unreadable {} as binary: {e}", path.display());
            true
        }
    }
}

/// Classify an in-memory prefix.
pub fn is_binary_bytes(prefix: &[u8]) -> bool {
    if prefix.contains(&0) {
        return true;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => false,
        // `error_len() == None` means the prefix ended mid-sequence, which
        // says nothing about the rest of the file.
        Err(e) => e.error_len().is_some(),
    }
}

fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut prefix = Vec::with_capacity(PREFIX_LEN);
    file.take(PREFIX_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn plain_utf8_is_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("SKILL.md");
        fs::write(&path, "# Skill\nÜbersicht — naïve café\n").unwrap();
        assert!(!is_binary(&path));
    }

    #[test]
    fn empty_file_is_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        fs::write(&path, b"").unwrap();
        assert!(!is_binary(&path));
    }

    #[test]
    fn nul_byte_in_prefix_is_binary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob");
        let mut bytes = vec![b'a'; PREFIX_LEN - 1];
        bytes.push(0);
        fs::write(&path, bytes).unwrap();
        assert!(is_binary(&path));
    }

    #[test]
    fn nul_byte_after_prefix_is_not_seen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("late-nul");
        let mut bytes = vec![b'a'; PREFIX_LEN];
        bytes.push(0);
        fs::write(&path, bytes).unwrap();
        assert!(!is_binary(&path));
    }

    #[test]
    fn invalid_utf8_is_binary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        fs::write(&path, b"caf\xe9 au lait\n").unwrap();
        assert!(is_binary(&path));
    }

    #[test]
    fn multibyte_char_split_at_prefix_boundary_is_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("boundary.md");
        let mut content = "a".repeat(PREFIX_LEN - 1);
        content.push('é');
        content.push_str("tail\n");
        fs::write(&path, content).unwrap();
        assert!(!is_binary(&path));
    }

    #[test]
    fn missing_file_is_binary() {
        let tmp = TempDir::new().unwrap();
        assert!(is_binary(&tmp.path().join("absent")));
    }
}
