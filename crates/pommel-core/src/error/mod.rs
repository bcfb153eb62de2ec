//! Error types and result aliases for Pommel operations.
//!
//! Only fatal conditions live here: a malformed document, a missing identity
//! field, a cyclic parent chain, or infrastructure failures. Everything a
//! resolution can survive is a [`crate::ResolutionFailure`] instead.

use thiserror::Error;

/// Unified error type for all Pommel operations
#[derive(Error, Debug)]
pub enum PommelError {
    // Descriptor errors
    #[error("Failed to parse descriptor {location}: {message}")]
    XmlParse { location: String, message: String },

    #[error("Descriptor {location} is missing required field '{field}'")]
    MissingField { location: String, field: String },

    #[error("Invalid coordinate '{input}': {reason}")]
    InvalidCoordinate { input: String, reason: String },

    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("Cyclic parent chain: {chain}")]
    ParentCycle { chain: String },

    // Config errors
    #[error("Failed to parse pommel.toml: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Session errors
    #[error("Resolution session was cancelled")]
    Cancelled,

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Pommel operations
pub type PommelResult<T> = Result<T, PommelError>;

impl PommelError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PommelError::Network { .. } | PommelError::Io { .. })
    }

    /// Check if this error is structural, i.e. fatal for one document only
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PommelError::XmlParse { .. }
                | PommelError::MissingField { .. }
                | PommelError::InvalidCoordinate { .. }
                | PommelError::ParentCycle { .. }
        )
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PommelError::XmlParse { .. } => Some("Check that the descriptor is well-formed XML"),
            PommelError::MissingField { .. } => {
                Some("Every descriptor needs a non-empty <artifactId>")
            }
            PommelError::ParentCycle { .. } => {
                Some("Break the cycle by pointing one <parent> at a different descriptor")
            }
            PommelError::Network { .. } => Some("Check your network connection and repository URLs"),
            PommelError::TomlParse { .. } | PommelError::ConfigValidation { .. } => {
                Some("Fix pommel.toml and run the command again")
            }
            _ => None,
        }
    }
}
