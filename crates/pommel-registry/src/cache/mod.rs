//! In-memory response cache with TTL support
//!
//! Successful responses are kept verbatim, keyed by the resolved URI they
//! were fetched from.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Default time-to-live for cached responses
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: Arc<[u8]>,
    pub stored_at: SystemTime,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(body: Arc<[u8]>) -> Self {
        Self::with_ttl(body, DEFAULT_TTL)
    }

    pub fn with_ttl(body: Arc<[u8]>, ttl: Duration) -> Self {
        Self {
            body,
            stored_at: SystemTime::now(),
            ttl,
        }
    }

    /// Check if cache entry is still fresh
    pub fn is_fresh(&self) -> bool {
        match self.stored_at.elapsed() {
            Ok(elapsed) => elapsed < self.ttl,
            Err(_) => false, // Clock went backwards, consider stale
        }
    }
}

/// URI-keyed response cache shared by all workers of a session
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
    pub total_bytes: usize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached body if fresh; stale entries are dropped on access
    pub fn get(&self, uri: &str) -> Option<Arc<[u8]>> {
        let fresh = self.entries.get(uri).map(|entry| (entry.is_fresh(), Arc::clone(&entry.body)));
        match fresh {
            Some((true, body)) => {
                tracing::trace!(uri, "response cache hit");
                Some(body)
            }
            Some((false, _)) => {
                self.entries.remove(uri);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, uri: impl Into<String>, body: Arc<[u8]>) {
        self.entries.insert(uri.into(), CacheEntry::new(body));
    }

    pub fn insert_with_ttl(&self, uri: impl Into<String>, body: Arc<[u8]>, ttl: Duration) {
        self.entries.insert(uri.into(), CacheEntry::with_ttl(body, ttl));
    }

    pub fn contains_fresh(&self, uri: &str) -> bool {
        self.entries.get(uri).map(|entry| entry.is_fresh()).unwrap_or(false)
    }

    pub fn stats(&self) -> ResponseCacheStats {
        let mut fresh_entries = 0;
        let mut total_bytes = 0;
        for entry in self.entries.iter() {
            if entry.is_fresh() {
                fresh_entries += 1;
            }
            total_bytes += entry.body.len();
        }
        ResponseCacheStats {
            total_entries: self.entries.len(),
            fresh_entries,
            stale_entries: self.entries.len() - fresh_entries,
            total_bytes,
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove stale entries, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh());
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests;
