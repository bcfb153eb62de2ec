//! # pommel-core
//!
//! Core types and utilities shared across all Pommel crates.
//!
//! This crate provides:
//! - Coordinate, Dependency and Scope types for the project model
//! - Maven-compatible Version ordering and VersionRange restrictions
//! - Repository descriptors, policies and mirror rewriting
//! - ResolutionFailure records and the shared FailureSink
//! - PommelError enum for fatal (structural) errors
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Coordinate, Version, Dependency, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{PommelError, PommelResult};
pub use types::{
    AttemptOutcome, ChecksumPolicy, Coordinate, Dependency, Exclusion, FailureKind, FailureSink,
    GroupArtifact, RepositoryAttempt, RepositoryDescriptor, ResolutionFailure, Scope, Version,
    VersionRange,
};
