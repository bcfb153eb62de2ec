//! Blake3 content hashes for cached entries

use blake3::Hasher;
use pommel_core::error::PommelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// A Blake3 content hash, serialized as lowercase hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Convert hash to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Create ContentHash from hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, PommelError> {
        let bytes = hex::decode(hex_str).map_err(|e| invalid_hash(hex_str, e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| invalid_hash(hex_str, format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self { bytes })
    }
}

fn invalid_hash(input: &str, reason: String) -> PommelError {
    PommelError::ConfigValidation {
        field: format!("cache index hash '{}'", input),
        reason,
    }
}

impl TryFrom<String> for ContentHash {
    type Error = PommelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Compute Blake3 hash of content
pub fn compute_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Hasher::new();
    hasher.update(content);
    ContentHash::new(*hasher.finalize().as_bytes())
}

/// Hash a single file
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<ContentHash, PommelError> {
    let content = fs::read(path.as_ref())
        .map_err(|e| PommelError::io(format!("Failed to read {} for hashing", path.as_ref().display()), e))?;
    Ok(compute_hash(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_conversion() {
        let hash = compute_hash(b"<project/>");
        let restored = ContentHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, restored);
        assert_eq!(hash.to_string().len(), 64);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_compute_hash() {
        assert_eq!(compute_hash(b"hello world"), compute_hash(b"hello world"));
        assert_ne!(compute_hash(b"hello world"), compute_hash(b"hello world!"));
    }

    #[test]
    fn test_serde_as_hex() {
        let hash = compute_hash(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib-1.0.pom");
        fs::write(&path, b"test content").unwrap();
        assert_eq!(hash_file(&path).unwrap(), compute_hash(b"test content"));
        assert!(hash_file(dir.path().join("missing")).is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::Config as ProptestConfig;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn hash_is_deterministic(content in prop::collection::vec(any::<u8>(), 0..1000)) {
            let first = compute_hash(&content);
            prop_assert_eq!(first, compute_hash(&content));
            prop_assert_eq!(ContentHash::from_hex(&first.to_hex()).unwrap(), first);
        }
    }
}
