//! Repository checksum files (`.sha1`, `.sha256`, `.sha512`)

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Supported checksum algorithms, in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

/// Result of checking fetched bytes against the repository checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumCheck {
    Verified(ChecksumAlgorithm),
    /// The repository publishes no checksum for the file
    Unavailable,
    Mismatch { expected: String, actual: String },
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 3] = [
        ChecksumAlgorithm::Sha1,
        ChecksumAlgorithm::Sha256,
        ChecksumAlgorithm::Sha512,
    ];

    /// File extension appended to the checked file's path
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `bytes`
    pub fn digest_hex(&self, bytes: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
            ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }

    /// Compare `bytes` against the body of a checksum file
    pub fn check(&self, bytes: &[u8], checksum_file: &[u8]) -> ChecksumCheck {
        let expected = match parse_checksum_file(checksum_file) {
            Some(expected) => expected,
            None => return ChecksumCheck::Unavailable,
        };
        let actual = self.digest_hex(bytes);
        if actual == expected {
            ChecksumCheck::Verified(*self)
        } else {
            ChecksumCheck::Mismatch { expected, actual }
        }
    }
}

/// First whitespace-separated token of a checksum file, lowercased.
///
/// Repositories publish both bare digests and `digest  filename` lines.
pub fn parse_checksum_file(content: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(content).ok()?;
    let token = text.split_whitespace().next()?;
    if token.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(token.to_ascii_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digests() {
        assert_eq!(
            ChecksumAlgorithm::Sha1.digest_hex(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            ChecksumAlgorithm::Sha256.digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(ChecksumAlgorithm::Sha512.digest_hex(b"abc").len(), 128);
    }

    #[test]
    fn test_parse_checksum_file() {
        assert_eq!(parse_checksum_file(b"ABCDEF\n").as_deref(), Some("abcdef"));
        assert_eq!(
            parse_checksum_file(b"abc123  lib-1.0.pom\n").as_deref(),
            Some("abc123")
        );
        assert_eq!(parse_checksum_file(b"   "), None);
        assert_eq!(parse_checksum_file(b"<html>"), None);
    }

    #[test]
    fn test_check() {
        let good = ChecksumAlgorithm::Sha1.digest_hex(b"payload");
        assert_eq!(
            ChecksumAlgorithm::Sha1.check(b"payload", good.as_bytes()),
            ChecksumCheck::Verified(ChecksumAlgorithm::Sha1)
        );
        assert!(matches!(
            ChecksumAlgorithm::Sha1.check(b"tampered", good.as_bytes()),
            ChecksumCheck::Mismatch { .. }
        ));
        assert_eq!(
            ChecksumAlgorithm::Sha1.check(b"payload", b""),
            ChecksumCheck::Unavailable
        );
    }
}
