//! Core data types for the Pommel project model.
//!
//! This module provides the fundamental types used throughout the workspace:
//! - Coordinates identifying resolvable units
//! - Version ordering and version ranges
//! - Dependency specifications and scopes
//! - Repository descriptors
//! - Non-fatal resolution failure records

pub mod coordinate;
pub mod dependency;
pub mod failure;
pub mod range;
pub mod repository;
pub mod version;

// Re-export all public types
pub use coordinate::{ArtifactKind, Coordinate, GroupArtifact};
pub use dependency::{Dependency, Exclusion, Scope};
pub use failure::{
    AttemptOutcome, FailureKind, FailureSink, RepositoryAttempt, ResolutionFailure,
};
pub use range::{Restriction, VersionRange};
pub use repository::{ChecksumPolicy, Mirror, RepositoryDescriptor, RepositoryPolicy};
pub use version::Version;
