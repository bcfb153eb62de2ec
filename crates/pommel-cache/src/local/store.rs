//! Local repository store
//!
//! Files live at their Maven repository paths under the root directory.
//! Metadata is stored per source repository as `maven-metadata-<id>.xml`
//! so listings from different repositories never overwrite each other.

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use walkdir::WalkDir;

use pommel_core::error::PommelError;
use pommel_core::types::{Coordinate, GroupArtifact};

use super::hash::{compute_hash, hash_file};
use super::{CacheEntry, CacheIndex};
use crate::CacheResult;

/// File name of the persisted content index
pub const INDEX_FILE_NAME: &str = ".pommel-index.json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What a cached file holds, and for metadata which repository it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Descriptor(Coordinate),
    Metadata {
        artifact: GroupArtifact,
        repository_id: String,
    },
    SnapshotMetadata {
        coordinate: Coordinate,
        repository_id: String,
    },
}

impl CacheKey {
    /// Repository-relative path of the cached file
    pub fn relative_path(&self) -> String {
        match self {
            CacheKey::Descriptor(coordinate) => coordinate.descriptor_path(),
            CacheKey::Metadata { artifact, repository_id } => {
                format!("{}/maven-metadata-{}.xml", artifact.base_path(), repository_id)
            }
            CacheKey::SnapshotMetadata { coordinate, repository_id } => {
                format!("{}/maven-metadata-{}.xml", coordinate.version_path(), repository_id)
            }
        }
    }
}

/// Result of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// The entry existed already and was left untouched
    AlreadyPresent,
}

/// Result of re-hashing indexed entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checked: usize,
    pub corrupted: Vec<String>,
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted.is_empty() && self.missing.is_empty()
    }
}

/// Summary of the files under the cache root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub files: usize,
    pub bytes: u64,
    pub descriptors: usize,
    pub metadata: usize,
    pub indexed: usize,
}

impl CacheStats {
    /// Format total size in human-readable form
    pub fn format_size(&self) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = self.bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", self.bytes, UNITS[0])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }
}

/// Append-only Maven-layout cache shared by all resolution workers
#[derive(Debug)]
pub struct LocalRepository {
    root: Utf8PathBuf,
    index: CacheIndex,
}

impl LocalRepository {
    /// Open (creating if needed) a local repository rooted at `root`
    pub fn open<P: AsRef<Utf8Path>>(root: P) -> CacheResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| PommelError::io(format!("Failed to create local repository {}", root), e))?;
        let index = CacheIndex::load_or_create(root.join(INDEX_FILE_NAME))?;
        tracing::debug!(root = %root, entries = index.len(), "opened local repository");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    /// Absolute path of a key
    pub fn path_of(&self, key: &CacheKey) -> Utf8PathBuf {
        self.root.join(key.relative_path())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_of(key).is_file()
    }

    /// Read a cached entry; a missing file is `Ok(None)`
    pub fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let path = self.path_of(key);
        match fs::read(&path) {
            Ok(bytes) => {
                tracing::trace!(path = %path, "local cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PommelError::io(format!("Failed to read {}", path), e)),
        }
    }

    /// Store an entry unless it already exists.
    ///
    /// Content goes to a unique temp file in the target directory and is
    /// renamed into place, so readers never observe a partial file.
    pub fn put(&self, key: &CacheKey, content: &[u8]) -> CacheResult<PutOutcome> {
        let relative = key.relative_path();
        let path = self.root.join(&relative);
        if path.is_file() {
            return Ok(PutOutcome::AlreadyPresent);
        }

        let parent = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent)
            .map_err(|e| PommelError::io(format!("Failed to create {}", parent), e))?;

        let file_name = path.file_name().unwrap_or("entry");
        let temp = parent.join(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, content).map_err(|e| PommelError::io(format!("Failed to write {}", temp), e))?;

        if path.is_file() {
            // Another writer won the race
            let _ = fs::remove_file(&temp);
            return Ok(PutOutcome::AlreadyPresent);
        }
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            if path.is_file() {
                return Ok(PutOutcome::AlreadyPresent);
            }
            return Err(PommelError::io(format!("Failed to move {} into place", path), e));
        }

        self.index
            .insert(CacheEntry::new(relative, compute_hash(content), content.len() as u64));
        tracing::debug!(path = %path, bytes = content.len(), "stored in local cache");
        Ok(PutOutcome::Stored)
    }

    /// Every cached per-repository metadata listing for an artifact
    pub fn cached_metadata(&self, artifact: &GroupArtifact) -> CacheResult<Vec<(String, Vec<u8>)>> {
        let dir = self.root.join(artifact.base_path());
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PommelError::io(format!("Failed to list {}", dir), e)),
        };

        let mut listings = Vec::new();
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let repository_id = match name
                .strip_prefix("maven-metadata-")
                .and_then(|rest| rest.strip_suffix(".xml"))
            {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };
            let bytes = fs::read(entry.path())
                .map_err(|e| PommelError::io(format!("Failed to read {}", name), e))?;
            listings.push((repository_id, bytes));
        }
        listings.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(listings)
    }

    /// Persist the content index
    pub fn flush(&self) -> CacheResult<()> {
        self.index.save()
    }

    /// Re-hash one entry against the index; unindexed entries pass
    pub fn verify(&self, key: &CacheKey) -> CacheResult<bool> {
        let relative = key.relative_path();
        let entry = match self.index.get(&relative) {
            Some(entry) => entry,
            None => return Ok(true),
        };
        match self.get(key)? {
            Some(bytes) => Ok(compute_hash(&bytes) == entry.hash),
            None => Ok(false),
        }
    }

    /// Re-hash every indexed entry in parallel
    pub fn verify_all(&self) -> VerifyReport {
        let entries = self.index.entries();
        let results: Vec<(String, Option<bool>)> = entries
            .par_iter()
            .map(|entry| {
                let path = self.root.join(&entry.path);
                let status = hash_file(&path).ok().map(|hash| hash == entry.hash);
                (entry.path.clone(), status)
            })
            .collect();

        let mut report = VerifyReport {
            checked: results.len(),
            ..VerifyReport::default()
        };
        for (path, status) in results {
            match status {
                Some(true) => {}
                Some(false) => report.corrupted.push(path),
                None => report.missing.push(path),
            }
        }
        if !report.is_clean() {
            tracing::warn!(
                corrupted = report.corrupted.len(),
                missing = report.missing.len(),
                "local cache verification found problems"
            );
        }
        report
    }

    /// Walk the cache tree
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            indexed: self.index.len(),
            ..CacheStats::default()
        };
        for entry in WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            stats.files += 1;
            stats.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            if name.ends_with(".pom") {
                stats.descriptors += 1;
            } else if name.starts_with("maven-metadata") {
                stats.metadata += 1;
            }
        }
        stats
    }

    /// Remove every cached file and reset the index, returning what was
    /// removed
    pub fn clean(&self) -> CacheResult<CacheStats> {
        let removed = self.stats();
        let read_dir = fs::read_dir(&self.root)
            .map_err(|e| PommelError::io(format!("Failed to list {}", self.root), e))?;
        for entry in read_dir.flatten() {
            let path = entry.path();
            let result = if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| PommelError::io(format!("Failed to remove {}", path.display()), e))?;
        }
        self.index.clear();
        tracing::info!(files = removed.files, bytes = removed.bytes, "cleaned local repository");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, LocalRepository) {
        let temp_dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().join("repo")).unwrap();
        let repo = LocalRepository::open(&root).unwrap();
        (temp_dir, repo)
    }

    fn descriptor_key() -> CacheKey {
        CacheKey::Descriptor(Coordinate::new("com.example", "lib", "1.0"))
    }

    #[test]
    fn test_layout() {
        assert_eq!(descriptor_key().relative_path(), "com/example/lib/1.0/lib-1.0.pom");
        let metadata = CacheKey::Metadata {
            artifact: GroupArtifact::new("com.example", "lib"),
            repository_id: "central".to_string(),
        };
        assert_eq!(metadata.relative_path(), "com/example/lib/maven-metadata-central.xml");
        let snapshot = CacheKey::SnapshotMetadata {
            coordinate: Coordinate::new("com.example", "lib", "2.0-SNAPSHOT"),
            repository_id: "snaps".to_string(),
        };
        assert_eq!(
            snapshot.relative_path(),
            "com/example/lib/2.0-SNAPSHOT/maven-metadata-snaps.xml"
        );
    }

    #[test]
    fn test_put_and_get() {
        let (_guard, repo) = open_temp();
        let key = descriptor_key();
        assert_eq!(repo.get(&key).unwrap(), None);
        assert!(!repo.contains(&key));

        assert_eq!(repo.put(&key, b"<project/>").unwrap(), PutOutcome::Stored);
        assert_eq!(repo.get(&key).unwrap().as_deref(), Some(&b"<project/>"[..]));
        assert!(repo.verify(&key).unwrap());
    }

    #[test]
    fn test_entries_are_never_rewritten() {
        let (_guard, repo) = open_temp();
        let key = descriptor_key();
        repo.put(&key, b"first").unwrap();
        assert_eq!(repo.put(&key, b"second").unwrap(), PutOutcome::AlreadyPresent);
        assert_eq!(repo.get(&key).unwrap().as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn test_concurrent_writers_same_key() {
        let (_guard, repo) = open_temp();
        let repo = Arc::new(repo);
        let key = descriptor_key();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let key = key.clone();
                std::thread::spawn(move || repo.put(&key, b"<project/>").unwrap())
            })
            .collect();
        let stored = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| *outcome == PutOutcome::Stored)
            .count();

        assert!(stored >= 1);
        assert_eq!(repo.get(&key).unwrap().as_deref(), Some(&b"<project/>"[..]));
        // No temp files left behind
        assert_eq!(repo.stats().files, 1);
    }

    #[test]
    fn test_cached_metadata_per_repository() {
        let (_guard, repo) = open_temp();
        let artifact = GroupArtifact::new("com.example", "lib");
        for id in ["central", "corp"] {
            let key = CacheKey::Metadata {
                artifact: artifact.clone(),
                repository_id: id.to_string(),
            };
            repo.put(&key, id.as_bytes()).unwrap();
        }
        repo.put(&descriptor_key(), b"<project/>").unwrap();

        let listings = repo.cached_metadata(&artifact).unwrap();
        let ids: Vec<_> = listings.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["central", "corp"]);
        assert!(repo
            .cached_metadata(&GroupArtifact::new("org.none", "x"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_verify_all_detects_corruption() {
        let (_guard, repo) = open_temp();
        let good = descriptor_key();
        let bad = CacheKey::Descriptor(Coordinate::new("com.example", "other", "1.0"));
        let gone = CacheKey::Descriptor(Coordinate::new("com.example", "gone", "1.0"));
        repo.put(&good, b"good").unwrap();
        repo.put(&bad, b"original").unwrap();
        repo.put(&gone, b"gone").unwrap();

        fs::write(repo.path_of(&bad), b"tampered").unwrap();
        fs::remove_file(repo.path_of(&gone)).unwrap();

        let report = repo.verify_all();
        assert_eq!(report.checked, 3);
        assert_eq!(report.corrupted, vec![bad.relative_path()]);
        assert_eq!(report.missing, vec![gone.relative_path()]);
        assert!(!repo.verify(&bad).unwrap());
    }

    #[test]
    fn test_stats_and_clean() {
        let (_guard, repo) = open_temp();
        repo.put(&descriptor_key(), b"12345").unwrap();
        repo.put(
            &CacheKey::Metadata {
                artifact: GroupArtifact::new("com.example", "lib"),
                repository_id: "central".to_string(),
            },
            b"<metadata/>",
        )
        .unwrap();
        repo.flush().unwrap();

        let stats = repo.stats();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.descriptors, 1);
        assert_eq!(stats.metadata, 1);
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.bytes, 16);

        let removed = repo.clean().unwrap();
        assert_eq!(removed.files, 2);
        assert_eq!(repo.stats().files, 0);
        assert!(repo.index().is_empty());
        assert_eq!(repo.put(&descriptor_key(), b"again").unwrap(), PutOutcome::Stored);
    }

    #[test]
    fn test_index_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        {
            let repo = LocalRepository::open(&root).unwrap();
            repo.put(&descriptor_key(), b"x").unwrap();
            repo.flush().unwrap();
        }
        let repo = LocalRepository::open(&root).unwrap();
        assert_eq!(repo.index().len(), 1);
        assert!(repo.verify_all().is_clean());
    }

    #[test]
    fn test_format_size() {
        let stats = CacheStats {
            bytes: 1536,
            ..CacheStats::default()
        };
        assert_eq!(stats.format_size(), "1.5 KB");
        let stats = CacheStats {
            bytes: 12,
            ..CacheStats::default()
        };
        assert_eq!(stats.format_size(), "12 B");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::Config as ProptestConfig;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn stored_content_reads_back_and_verifies(content in prop::collection::vec(any::<u8>(), 0..1000)) {
            let temp_dir = tempfile::tempdir().unwrap();
            let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
            let repo = LocalRepository::open(&root).unwrap();
            let key = CacheKey::Descriptor(Coordinate::new("g", "a", "1"));

            repo.put(&key, &content).unwrap();
            prop_assert_eq!(repo.get(&key).unwrap(), Some(content));
            prop_assert!(repo.verify_all().is_clean());
        }
    }
}
