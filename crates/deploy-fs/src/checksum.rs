//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used throughout
//! the workspace for backup integrity verification.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of string content.
pub fn compute_content_checksum(content: &str) -> String {
    compute_bytes_checksum(content.as_bytes())
}

/// Compute the SHA-256 checksum of raw bytes.
pub fn compute_bytes_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(compute_bytes_checksum(&content))
}

/// Compute the SHA-256 checksum of a file by streaming it in chunks.
///
/// Produces the same value as [`compute_file_checksum`] without loading
/// the whole file.
pub fn compute_file_checksum_streaming(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// Combine per-entry checksums into one digest.
///
/// Entries are hashed as `name\0checksum\n` in the given order, so callers
/// must pass them sorted for a stable result.
pub fn compute_manifest_checksum<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut hasher = Sha256::new();
    for (name, checksum) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(checksum.as_bytes());
        hasher.update(b"\n");
    }
    format!("{}{:x}", PREFIX, hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checksum_has_prefix() {
        let checksum = compute_content_checksum("hello world");
        assert!(checksum.starts_with("sha256:"));
    }

    #[test]
    fn different_content_different_checksum() {
        let a = compute_content_checksum("aaa");
        let b = compute_content_checksum("bbb");
        assert_ne!(a, b);
    }

    #[test]
    fn content_checksum_known_value() {
        let checksum = compute_content_checksum("hello world");
        assert_eq!(
            checksum,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn streaming_matches_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            compute_file_checksum(&path).unwrap(),
            compute_file_checksum_streaming(&path).unwrap()
        );
        assert_eq!(
            compute_file_checksum(&path).unwrap(),
            compute_bytes_checksum(&content)
        );
    }

    #[test]
    fn manifest_checksum_depends_on_order_and_content() {
        let a = compute_manifest_checksum([("a", "sha256:1"), ("b", "sha256:2")]);
        let b = compute_manifest_checksum([("b", "sha256:2"), ("a", "sha256:1")]);
        let c = compute_manifest_checksum([("a", "sha256:1"), ("b", "sha256:3")]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
