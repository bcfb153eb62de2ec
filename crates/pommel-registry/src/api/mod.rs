//! `maven-metadata.xml` model
//!
//! Artifact-level metadata lists the published versions of `g:a`;
//! version-level metadata of a snapshot names the timestamped files.

use serde::{Deserialize, Serialize};

use pommel_core::error::PommelError;
use pommel_core::types::Version;

use crate::RegistryResult;

/// Parsed `maven-metadata.xml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenMetadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    /// Set on version-level (snapshot) metadata
    pub version: Option<String>,
    pub latest: Option<String>,
    pub release: Option<String>,
    /// Published versions in document order, no duplicates
    pub versions: Vec<String>,
    /// `yyyyMMddHHmmss`
    pub last_updated: Option<String>,
    pub snapshot: Option<SnapshotInfo>,
    pub snapshot_versions: Vec<SnapshotVersion>,
}

/// `<versioning><snapshot>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub timestamp: Option<String>,
    pub build_number: Option<u32>,
    pub local_copy: bool,
}

/// `<versioning><snapshotVersions><snapshotVersion>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersion {
    pub extension: String,
    pub classifier: Option<String>,
    pub value: String,
    pub updated: Option<String>,
}

fn child<'a, 'input>(node: roxmltree::Node<'a, 'input>, name: &str) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|c| c.is_element() && c.tag_name().name() == name)
}

fn text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl MavenMetadata {
    /// Parse metadata bytes; `location` names the source in errors
    pub fn parse(bytes: &[u8], location: &str) -> RegistryResult<Self> {
        let content = std::str::from_utf8(bytes).map_err(|e| PommelError::XmlParse {
            location: location.to_string(),
            message: format!("metadata is not UTF-8: {}", e),
        })?;
        let document = roxmltree::Document::parse(content).map_err(|e| PommelError::XmlParse {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        let root = document.root_element();
        if root.tag_name().name() != "metadata" {
            return Err(PommelError::XmlParse {
                location: location.to_string(),
                message: format!("expected <metadata>, found <{}>", root.tag_name().name()),
            });
        }

        let mut metadata = MavenMetadata {
            group_id: text(root, "groupId"),
            artifact_id: text(root, "artifactId"),
            version: text(root, "version"),
            ..MavenMetadata::default()
        };

        if let Some(versioning) = child(root, "versioning") {
            metadata.latest = text(versioning, "latest");
            metadata.release = text(versioning, "release");
            metadata.last_updated = text(versioning, "lastUpdated");

            if let Some(versions) = child(versioning, "versions") {
                for version in versions
                    .children()
                    .filter(|c| c.is_element() && c.tag_name().name() == "version")
                    .filter_map(|c| c.text())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                {
                    if !metadata.versions.iter().any(|v| v == version) {
                        metadata.versions.push(version.to_string());
                    }
                }
            }

            if let Some(snapshot) = child(versioning, "snapshot") {
                metadata.snapshot = Some(SnapshotInfo {
                    timestamp: text(snapshot, "timestamp"),
                    build_number: text(snapshot, "buildNumber").and_then(|n| n.parse().ok()),
                    local_copy: text(snapshot, "localCopy").as_deref() == Some("true"),
                });
            }

            if let Some(snapshot_versions) = child(versioning, "snapshotVersions") {
                metadata.snapshot_versions = snapshot_versions
                    .children()
                    .filter(|c| c.is_element() && c.tag_name().name() == "snapshotVersion")
                    .filter_map(|node| {
                        Some(SnapshotVersion {
                            extension: text(node, "extension")?,
                            classifier: text(node, "classifier"),
                            value: text(node, "value")?,
                            updated: text(node, "updated"),
                        })
                    })
                    .collect();
            }
        }

        // Legacy metadata without <versioning> still lists its own version
        if metadata.versions.is_empty() {
            if let Some(version) = &metadata.version {
                metadata.versions.push(version.clone());
            }
        }

        Ok(metadata)
    }

    /// Union `other` into `self`. Versions are kept without duplicates and
    /// `latest`/`release` come from whichever side was updated last.
    pub fn merge(&mut self, other: &MavenMetadata) {
        for version in &other.versions {
            if !self.versions.iter().any(|v| v == version) {
                self.versions.push(version.clone());
            }
        }

        let other_newer = match (&self.last_updated, &other.last_updated) {
            (Some(mine), Some(theirs)) => theirs > mine,
            (None, Some(_)) => true,
            _ => false,
        };
        if other_newer {
            self.latest = other.latest.clone().or_else(|| self.latest.take());
            self.release = other.release.clone().or_else(|| self.release.take());
            self.last_updated = other.last_updated.clone();
            if other.snapshot.is_some() {
                self.snapshot = other.snapshot.clone();
                self.snapshot_versions = other.snapshot_versions.clone();
            }
        } else {
            self.latest = self.latest.take().or_else(|| other.latest.clone());
            self.release = self.release.take().or_else(|| other.release.clone());
            if self.snapshot.is_none() {
                self.snapshot = other.snapshot.clone();
                self.snapshot_versions = other.snapshot_versions.clone();
            }
        }

        self.group_id = self.group_id.take().or_else(|| other.group_id.clone());
        self.artifact_id = self.artifact_id.take().or_else(|| other.artifact_id.clone());
        self.version = self.version.take().or_else(|| other.version.clone());
    }

    /// Published versions in ascending order
    pub fn sorted_versions(&self) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .versions
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        versions.sort();
        versions.dedup();
        versions
    }

    /// File version of a snapshot artifact with the given extension,
    /// e.g. `1.0-20240101.120000-3` for `1.0-SNAPSHOT`.
    ///
    /// `None` when the metadata has no timestamp or marks a local copy.
    pub fn timestamped_version(&self, extension: &str) -> Option<String> {
        if let Some(found) = self
            .snapshot_versions
            .iter()
            .find(|sv| sv.extension == extension && sv.classifier.is_none())
        {
            return Some(found.value.clone());
        }

        let snapshot = self.snapshot.as_ref()?;
        if snapshot.local_copy {
            return None;
        }
        let timestamp = snapshot.timestamp.as_ref()?;
        let build_number = snapshot.build_number?;
        let base = self.version.as_ref()?.strip_suffix("SNAPSHOT")?;
        Some(format!("{}{}-{}", base, timestamp, build_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>com.example</groupId>
  <artifactId>lib</artifactId>
  <versioning>
    <latest>1.1-SNAPSHOT</latest>
    <release>1.1</release>
    <versions>
      <version>1.0</version>
      <version>1.1-SNAPSHOT</version>
      <version>1.1</version>
      <version>1.0</version>
    </versions>
    <lastUpdated>20240101120000</lastUpdated>
  </versioning>
</metadata>"#;

    const SNAPSHOT_METADATA: &str = r#"<metadata modelVersion="1.1.0">
  <groupId>com.example</groupId>
  <artifactId>lib</artifactId>
  <version>2.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20240102.030405</timestamp>
      <buildNumber>7</buildNumber>
    </snapshot>
    <lastUpdated>20240102030405</lastUpdated>
    <snapshotVersions>
      <snapshotVersion>
        <extension>jar</extension>
        <value>2.0-20240102.030405-7</value>
      </snapshotVersion>
      <snapshotVersion>
        <classifier>sources</classifier>
        <extension>pom</extension>
        <value>2.0-20240101.000000-1</value>
      </snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>"#;

    #[test]
    fn test_parse_artifact_metadata() {
        let metadata = MavenMetadata::parse(ARTIFACT_METADATA.as_bytes(), "test").unwrap();
        assert_eq!(metadata.group_id.as_deref(), Some("com.example"));
        assert_eq!(metadata.release.as_deref(), Some("1.1"));
        assert_eq!(metadata.versions, vec!["1.0", "1.1-SNAPSHOT", "1.1"]);
        let sorted: Vec<_> = metadata
            .sorted_versions()
            .iter()
            .map(|v| v.as_str().to_string())
            .collect();
        assert_eq!(sorted, vec!["1.0", "1.1-SNAPSHOT", "1.1"]);
    }

    #[test]
    fn test_timestamped_version() {
        let metadata = MavenMetadata::parse(SNAPSHOT_METADATA.as_bytes(), "test").unwrap();
        assert_eq!(metadata.version.as_deref(), Some("2.0-SNAPSHOT"));
        // No classifier-free pom entry, falls back to <snapshot>
        assert_eq!(
            metadata.timestamped_version("pom").as_deref(),
            Some("2.0-20240102.030405-7")
        );
        assert_eq!(
            metadata.timestamped_version("jar").as_deref(),
            Some("2.0-20240102.030405-7")
        );

        let local = MavenMetadata::parse(
            b"<metadata><version>1-SNAPSHOT</version><versioning><snapshot><localCopy>true</localCopy></snapshot>\
              </versioning></metadata>",
            "local",
        )
        .unwrap();
        assert_eq!(local.timestamped_version("pom"), None);
    }

    #[test]
    fn test_merge_prefers_newer_pointers() {
        let mut older = MavenMetadata::parse(ARTIFACT_METADATA.as_bytes(), "a").unwrap();
        let newer = MavenMetadata::parse(
            b"<metadata><versioning><release>1.2</release><versions><version>1.2</version><version>1.1</version>\
              </versions><lastUpdated>20250101000000</lastUpdated></versioning></metadata>",
            "b",
        )
        .unwrap();
        older.merge(&newer);
        assert_eq!(older.versions, vec!["1.0", "1.1-SNAPSHOT", "1.1", "1.2"]);
        assert_eq!(older.release.as_deref(), Some("1.2"));
        assert_eq!(older.latest.as_deref(), Some("1.1-SNAPSHOT"));
        assert_eq!(older.last_updated.as_deref(), Some("20250101000000"));
        assert_eq!(older.group_id.as_deref(), Some("com.example"));
    }

    #[test]
    fn test_merge_keeps_own_pointers_when_newer() {
        let mut newer = MavenMetadata::parse(ARTIFACT_METADATA.as_bytes(), "a").unwrap();
        let older = MavenMetadata::parse(
            b"<metadata><versioning><release>0.9</release><versions><version>0.9</version></versions>\
              <lastUpdated>20200101000000</lastUpdated></versioning></metadata>",
            "b",
        )
        .unwrap();
        newer.merge(&older);
        assert_eq!(newer.release.as_deref(), Some("1.1"));
        assert!(newer.versions.contains(&"0.9".to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            MavenMetadata::parse(b"<project/>", "x"),
            Err(PommelError::XmlParse { .. })
        ));
        assert!(MavenMetadata::parse(b"<metadata>", "x").is_err());
        assert!(MavenMetadata::parse(&[0xff, 0xfe], "x").is_err());
    }
}
