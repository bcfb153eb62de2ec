//! Content index for the local repository
//!
//! Maps each cached file (by repository-relative path) to the Blake3 hash
//! and size it was written with. The index is persisted as JSON next to the
//! cached files.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pommel_core::error::PommelError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::ContentHash;
use crate::CacheResult;

/// Metadata for a cached entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Repository-relative path of the cached file
    pub path: String,
    /// Content hash
    pub hash: ContentHash,
    /// Size in bytes
    pub size: u64,
    /// When the entry was stored (unix seconds)
    pub stored_at: i64,
}

impl CacheEntry {
    pub fn new(path: impl Into<String>, hash: ContentHash, size: u64) -> Self {
        Self {
            path: path.into(),
            hash,
            size,
            stored_at: Utc::now().timestamp(),
        }
    }

    /// Get stored_at as DateTime
    pub fn stored_at_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.stored_at, 0).unwrap_or_else(Utc::now)
    }
}

/// Index of cached entries keyed by relative path
#[derive(Debug)]
pub struct CacheIndex {
    entries: DashMap<String, CacheEntry>,
    index_path: PathBuf,
}

impl CacheIndex {
    /// Load existing index or create new one.
    ///
    /// An unreadable or corrupt index starts fresh; the files themselves
    /// are still served, they are just not tracked until rewritten.
    pub fn load_or_create<P: AsRef<Path>>(index_path: P) -> CacheResult<Self> {
        let index_path = index_path.as_ref().to_path_buf();
        let entries = DashMap::new();

        if index_path.exists() {
            match fs::read_to_string(&index_path) {
                Ok(content) => match serde_json::from_str::<Vec<CacheEntry>>(&content) {
                    Ok(loaded) => {
                        for entry in loaded {
                            entries.insert(entry.path.clone(), entry);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %index_path.display(), error = %e, "discarding corrupt cache index");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %index_path.display(), error = %e, "cache index unreadable");
                }
            }
        }

        Ok(Self { entries, index_path })
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &str) -> Option<CacheEntry> {
        self.entries.get(path).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, path: &str) -> Option<CacheEntry> {
        self.entries.remove(path).map(|(_, entry)| entry)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// All entries sorted by path
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Save index to disk through a temp file and rename
    pub fn save(&self) -> CacheResult<()> {
        let content = serde_json::to_string_pretty(&self.entries()).map_err(|e| {
            PommelError::io(
                "Failed to serialize cache index".to_string(),
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?;

        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PommelError::io("Failed to create index directory".to_string(), e))?;
        }

        let temp = self.index_path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&temp, content)
            .map_err(|e| PommelError::io("Failed to write cache index".to_string(), e))?;
        fs::rename(&temp, &self.index_path)
            .map_err(|e| PommelError::io("Failed to replace cache index".to_string(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::hash::compute_hash;
    use tempfile::tempdir;

    #[test]
    fn test_index_operations() {
        let temp_dir = tempdir().unwrap();
        let index = CacheIndex::load_or_create(temp_dir.path().join("index.json")).unwrap();
        assert!(index.is_empty());

        let entry = CacheEntry::new("org/x/1.0/x-1.0.pom", compute_hash(b"x"), 1);
        index.insert(entry.clone());
        assert_eq!(index.get("org/x/1.0/x-1.0.pom"), Some(entry.clone()));
        assert_eq!(index.len(), 1);

        assert_eq!(index.remove("org/x/1.0/x-1.0.pom"), Some(entry));
        assert!(index.get("org/x/1.0/x-1.0.pom").is_none());
    }

    #[test]
    fn test_stored_at_datetime() {
        let before = Utc::now().timestamp();
        let entry = CacheEntry::new("a", compute_hash(b"a"), 1);
        let stored = entry.stored_at_datetime().timestamp();
        assert!(stored >= before && stored <= Utc::now().timestamp());
    }

    #[test]
    fn test_index_persistence() {
        let temp_dir = tempdir().unwrap();
        let index_path = temp_dir.path().join("index.json");

        {
            let index = CacheIndex::load_or_create(&index_path).unwrap();
            index.insert(CacheEntry::new("b", compute_hash(b"b"), 1));
            index.insert(CacheEntry::new("a", compute_hash(b"a"), 1));
            index.save().unwrap();
        }

        let index = CacheIndex::load_or_create(&index_path).unwrap();
        let paths: Vec<_> = index.entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }

    #[test]
    fn test_corrupt_index_starts_fresh() {
        let temp_dir = tempdir().unwrap();
        let index_path = temp_dir.path().join("index.json");
        fs::write(&index_path, "{not json").unwrap();
        let index = CacheIndex::load_or_create(&index_path).unwrap();
        assert!(index.is_empty());
    }
}
