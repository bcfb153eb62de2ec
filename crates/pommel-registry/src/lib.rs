//! Maven repository client for Pommel
//!
//! This crate fetches descriptors, version listings and checksums from an
//! ordered list of repositories over HTTP(S) or `file://`, with retry logic,
//! an in-memory response cache, a per-session attempt memo and the local
//! repository cache underneath.

pub mod api;
pub mod cache;
pub mod checksum;
pub mod client;
pub mod fetcher;

// Re-export main types
pub use api::{MavenMetadata, SnapshotInfo, SnapshotVersion};
pub use cache::{ResponseCache, ResponseCacheStats};
pub use checksum::{ChecksumAlgorithm, ChecksumCheck};
pub use client::{
    ClientConfig, CredentialSource, Credentials, FetchResponse, RepositoryClient, RetryConfig,
    StaticCredentials,
};
pub use fetcher::{CancellationFlag, FetchOutcome, Fetched, FetcherOptions, RepositoryFetcher};

use pommel_core::error::PommelError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, PommelError>;
