//! Local repository cache for Pommel
//!
//! Fetched descriptors and metadata are stored in a Maven-style local
//! repository layout. Entries are written once through a temp file and an
//! atomic rename, and tracked in a Blake3 content index so the cache can be
//! verified and reported on.

pub mod local;

// Re-export main types
pub use local::{
    CacheEntry, CacheIndex, CacheKey, CacheStats, ContentHash, LocalRepository, PutOutcome,
    VerifyReport,
};

use pommel_core::error::PommelError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, PommelError>;
