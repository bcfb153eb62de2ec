//! Maven-layout local repository
//!
//! Storage, the content index and hashing helpers.

pub mod hash;
pub mod index;
pub mod store;

// Re-export main types
pub use hash::ContentHash;
pub use index::{CacheEntry, CacheIndex};
pub use store::{CacheKey, CacheStats, LocalRepository, PutOutcome, VerifyReport};
