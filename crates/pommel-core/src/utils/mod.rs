//! Utility functions and helpers.
//!
//! Common functionality used across multiple Pommel crates.

pub mod path;

// Re-export commonly used utilities
pub use path::{file_url_to_path, normalize_path, path_to_file_url, resolve_descriptor_path};
