//! Path utilities for descriptor locations and file repositories.

use std::path::{Component, Path, PathBuf};

/// File name used when a descriptor path points at a directory
pub const DEFAULT_DESCRIPTOR_NAME: &str = "pom.xml";

/// Normalize a path by resolving . and .. components lexically
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // Cannot go above the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }

    components.iter().collect()
}

/// Resolve a parent `relativePath` against the directory of the child
/// descriptor. Paths that do not name an `.xml` file are treated as
/// directories and get `pom.xml` appended.
pub fn resolve_descriptor_path(base_dir: &Path, relative: &str) -> PathBuf {
    let joined = normalize_path(&base_dir.join(relative.trim()));
    let names_file = joined
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false);
    if names_file && !joined.is_dir() {
        joined
    } else {
        joined.join(DEFAULT_DESCRIPTOR_NAME)
    }
}

/// Local path of a `file:` URL
pub fn file_url_to_path(location: &str) -> Option<PathBuf> {
    url::Url::parse(location).ok()?.to_file_path().ok()
}

/// `file:` URL for an absolute local path
pub fn path_to_file_url(path: &Path) -> Option<String> {
    url::Url::from_directory_path(path)
        .or_else(|_| url::Url::from_file_path(path))
        .ok()
        .map(|u| u.to_string().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./pom.xml")),
            PathBuf::from("/a/c/pom.xml")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn test_resolve_descriptor_path() {
        let base = Path::new("/work/project/module");
        assert_eq!(
            resolve_descriptor_path(base, "../pom.xml"),
            PathBuf::from("/work/project/pom.xml")
        );
        assert_eq!(
            resolve_descriptor_path(base, "../parent"),
            PathBuf::from("/work/project/parent/pom.xml")
        );
        assert_eq!(
            resolve_descriptor_path(base, "../build/parent.xml"),
            PathBuf::from("/work/project/build/parent.xml")
        );
    }

    #[test]
    fn test_file_url_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let url = path_to_file_url(dir.path()).unwrap();
        assert!(url.starts_with("file://"));
        assert!(!url.ends_with('/'));
        assert_eq!(file_url_to_path(&url).unwrap(), dir.path());
        assert!(file_url_to_path("https://example.com").is_none());
    }
}
