//! Configuration for the Pommel resolution engine
//!
//! This crate handles parsing and validation of `pommel.toml` files and the
//! layering of global, project, environment and command-line settings into
//! one resolved configuration.

pub mod merge;
pub mod settings;

// Re-export main types
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource};
pub use settings::{
    CredentialSection, MirrorSection, PommelToml, ProfilesSection, RepositorySection,
    ResolverSection, ResolverSettings,
};

use pommel_core::error::PommelError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, PommelError>;
