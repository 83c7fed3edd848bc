//! Hashing utilities for artifact integrity verification.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Compute SHA256 hash of bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a reader.
pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute SHA256 hash of a file on disk.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    sha256_reader(File::open(path)?)
}

/// Look up the digest for `file_name` in a `sha256sum`-style listing.
///
/// Lines look like `<hex>  <name>` or `<hex> *<name>`. A listing that holds a
/// single bare digest (the `<asset>.sha256` convention) matches any name.
pub fn find_checksum(listing: &str, file_name: &str) -> Option<String> {
    let mut bare = None;

    for line in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        match parts.next() {
            Some(name) if name.trim_start_matches('*') == file_name => {
                return Some(digest.to_lowercase());
            }
            Some(_) => continue,
            None if bare.is_none() => bare = Some(digest.to_lowercase()),
            None => {}
        }
    }

    bare.filter(|d| d.len() == 64 && d.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Verify a file against an expected SHA256 digest.
pub fn verify_file(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !expected.trim().eq_ignore_ascii_case(&actual) {
        return Err(Error::ChecksumMismatch {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            expected: expected.trim().to_lowercase(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_bytes() {
        assert_eq!(sha256_bytes(b"hello world"), HELLO);
    }

    #[test]
    fn test_find_checksum_in_listing() {
        let listing = format!(
            "{}  gost_3.0.0_linux_arm64.tar.gz\n{} *gost_3.0.0_linux_amd64.tar.gz\n",
            "a".repeat(64),
            HELLO
        );
        assert_eq!(
            find_checksum(&listing, "gost_3.0.0_linux_amd64.tar.gz").as_deref(),
            Some(HELLO)
        );
        assert!(find_checksum(&listing, "gost_3.0.0_linux_armv7.tar.gz").is_none());
    }

    #[test]
    fn test_find_checksum_bare_digest() {
        assert_eq!(
            find_checksum(&format!("{}\n", HELLO), "anything").as_deref(),
            Some(HELLO)
        );
    }

    #[test]
    fn test_verify_file_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"hello world").unwrap();

        assert!(verify_file(&path, HELLO).is_ok());
        let err = verify_file(&path, &"0".repeat(64)).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }
}
