//! Resolution engine for Pommel
//!
//! This crate turns a parsed descriptor into its effective form (parent
//! chain merged, profiles injected, properties interpolated, BOMs imported)
//! and expands its dependencies into per-scope resolved sets with Maven's
//! transitivity, exclusion and nearest-wins mediation rules.
//!
//! Everything that can go wrong without invalidating the input document is
//! recorded as a [`pommel_core::ResolutionFailure`] on the result; only
//! structural problems and cancellation surface as errors.

pub mod effective;
pub mod graph;
pub mod resolve;
pub mod session;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use effective::EffectiveDescriptor;
pub use graph::{DependencyEdge, DependencyGraph, DependencyNode, ResolvedDependencyGraph, ResolvedEntry};
pub use resolve::{ResolutionResult, Resolver};
pub use session::{NodeState, ResolutionSession};
pub use version::{SelectionError, VersionSelector};

use pommel_core::error::PommelError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, PommelError>;
