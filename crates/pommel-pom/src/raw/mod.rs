//! Tolerant, string-only reading of descriptor documents.
//!
//! A [`RawDescriptor`] mirrors the XML without any validation: every value is
//! an optional trimmed string, element order is irrelevant and empty or
//! self-closing elements read as absent. The legacy `project.xml` dialect
//! is folded into the current vocabulary here so that nothing downstream
//! needs to know about it.

use pommel_core::{PommelError, PommelResult};

/// Syntactic view of a `<project>` document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDescriptor {
    pub location: String,
    pub model_version: Option<String>,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent: Option<RawParent>,
    pub properties: Vec<(String, String)>,
    pub dependencies: Vec<RawDependency>,
    pub dependency_management: Vec<RawDependency>,
    pub plugins: Vec<RawPlugin>,
    pub plugin_management: Vec<RawPlugin>,
    pub repositories: Vec<RawRepository>,
    pub plugin_repositories: Vec<RawRepository>,
    pub modules: Vec<String>,
    pub profiles: Vec<RawProfile>,
    pub relocation: Option<RawRelocation>,
    /// Set when legacy fields were folded in
    pub legacy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParent {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    /// `Some("")` for an explicit empty `<relativePath/>`
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDependency {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub kind: Option<String>,
    pub classifier: Option<String>,
    pub scope: Option<String>,
    pub optional: Option<String>,
    pub system_path: Option<String>,
    pub exclusions: Vec<RawExclusion>,
    /// Legacy `<id>` naming both group and artifact
    pub legacy_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExclusion {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPlugin {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<RawDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRepository {
    pub id: Option<String>,
    pub url: Option<String>,
    pub releases_enabled: Option<String>,
    pub releases_checksum: Option<String>,
    pub snapshots_enabled: Option<String>,
    pub snapshots_checksum: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProfile {
    pub id: Option<String>,
    pub activation: Option<RawActivation>,
    pub properties: Vec<(String, String)>,
    pub dependencies: Vec<RawDependency>,
    pub dependency_management: Vec<RawDependency>,
    pub plugins: Vec<RawPlugin>,
    pub repositories: Vec<RawRepository>,
    pub plugin_repositories: Vec<RawRepository>,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawActivation {
    pub active_by_default: Option<String>,
    pub jdk: Option<String>,
    pub os_name: Option<String>,
    pub os_family: Option<String>,
    pub os_arch: Option<String>,
    pub os_version: Option<String>,
    pub property_name: Option<String>,
    pub property_value: Option<String>,
    pub file_exists: Option<String>,
    pub file_missing: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRelocation {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub message: Option<String>,
}

type Node<'a, 'input> = roxmltree::Node<'a, 'input>;

impl RawDescriptor {
    /// Read a descriptor document. `location` is only used in diagnostics.
    pub fn parse(text: &str, location: &str) -> PommelResult<Self> {
        let doc = roxmltree::Document::parse(text).map_err(|e| PommelError::XmlParse {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        let project = doc.root_element();
        if project.tag_name().name() != "project" {
            return Err(PommelError::XmlParse {
                location: location.to_string(),
                message: format!(
                    "root element is <{}>, expected <project>",
                    project.tag_name().name()
                ),
            });
        }

        let mut raw = RawDescriptor {
            location: location.to_string(),
            model_version: child_text(project, "modelVersion"),
            group_id: child_text(project, "groupId"),
            artifact_id: child_text(project, "artifactId"),
            version: child_text(project, "version"),
            packaging: child_text(project, "packaging"),
            name: child_text(project, "name"),
            description: child_text(project, "description"),
            parent: child_element(project, "parent").map(read_parent),
            properties: read_properties(project),
            dependencies: read_dependency_list(project),
            dependency_management: child_element(project, "dependencyManagement")
                .map(read_dependency_list)
                .unwrap_or_default(),
            plugins: child_element(project, "build").map(read_plugin_list).unwrap_or_default(),
            plugin_management: child_element(project, "build")
                .and_then(|build| child_element(build, "pluginManagement"))
                .map(read_plugin_list)
                .unwrap_or_default(),
            repositories: read_repositories(project, "repositories", "repository"),
            plugin_repositories: read_repositories(project, "pluginRepositories", "pluginRepository"),
            modules: read_modules(project),
            profiles: child_element(project, "profiles")
                .map(|profiles| children(profiles, "profile").map(read_profile).collect())
                .unwrap_or_default(),
            relocation: child_element(project, "distributionManagement")
                .and_then(|dm| child_element(dm, "relocation"))
                .map(|node| RawRelocation {
                    group_id: child_text(node, "groupId"),
                    artifact_id: child_text(node, "artifactId"),
                    version: child_text(node, "version"),
                    message: child_text(node, "message"),
                }),
            legacy: false,
        };

        normalize_legacy(project, &mut raw);
        Ok(raw)
    }
}

/// Fold the legacy `project.xml` vocabulary into the current one.
///
/// `currentVersion` becomes `version`, a bare `id` becomes the artifactId,
/// `extend` becomes a parent reference by relative path, and the single
/// `repository` connection becomes one repository entry.
fn normalize_legacy(project: Node<'_, '_>, raw: &mut RawDescriptor) {
    if raw.version.is_none() {
        if let Some(current) = child_text(project, "currentVersion") {
            raw.version = Some(current);
            raw.legacy = true;
        }
    }

    if raw.artifact_id.is_none() {
        if let Some(id) = child_text(project, "id") {
            let (group, artifact) = split_legacy_id(&id);
            if raw.group_id.is_none() {
                raw.group_id = group;
            }
            raw.artifact_id = Some(artifact);
            raw.legacy = true;
        }
    }

    if raw.parent.is_none() {
        if let Some(extend) = child_text(project, "extend") {
            raw.parent = Some(RawParent {
                relative_path: Some(extend.replace("${basedir}/", "")),
                ..RawParent::default()
            });
            raw.legacy = true;
        }
    }

    if child_element(project, "repositories").is_none() {
        if let Some(node) = child_element(project, "repository") {
            let url = child_text(node, "url")
                .or_else(|| child_text(node, "connection").map(|c| strip_scm_prefix(&c)));
            if let Some(url) = url {
                raw.repositories.push(RawRepository {
                    id: Some("legacy".to_string()),
                    url: Some(url),
                    ..RawRepository::default()
                });
                raw.legacy = true;
            }
        }
    }

    for dependency in &mut raw.dependencies {
        raw.legacy |= fill_from_legacy_id(dependency);
    }
}

fn fill_from_legacy_id(dependency: &mut RawDependency) -> bool {
    let Some(id) = dependency.legacy_id.clone() else {
        return false;
    };
    if dependency.group_id.is_some() && dependency.artifact_id.is_some() {
        return false;
    }
    let (group, artifact) = split_legacy_id(&id);
    if dependency.group_id.is_none() {
        dependency.group_id = Some(group.unwrap_or_else(|| artifact.clone()));
    }
    if dependency.artifact_id.is_none() {
        dependency.artifact_id = Some(artifact);
    }
    true
}

/// `group:artifact` or a bare id used for both
fn split_legacy_id(id: &str) -> (Option<String>, String) {
    match id.split_once(':') {
        Some((group, artifact)) => (Some(group.to_string()), artifact.to_string()),
        None => (Some(id.to_string()), id.to_string()),
    }
}

/// `scm:svn:https://host/repo` -> `https://host/repo`
fn strip_scm_prefix(connection: &str) -> String {
    match connection.strip_prefix("scm:") {
        Some(rest) => {
            let separator = if rest.contains('|') { '|' } else { ':' };
            rest.split_once(separator)
                .map(|(_, location)| location.to_string())
                .unwrap_or_else(|| rest.to_string())
        }
        None => connection.to_string(),
    }
}

fn read_parent(node: Node<'_, '_>) -> RawParent {
    RawParent {
        group_id: child_text(node, "groupId"),
        artifact_id: child_text(node, "artifactId"),
        version: child_text(node, "version"),
        relative_path: child_element(node, "relativePath")
            .map(|rp| rp.text().map(str::trim).unwrap_or_default().to_string()),
    }
}

fn read_properties(node: Node<'_, '_>) -> Vec<(String, String)> {
    let Some(props) = child_element(node, "properties") else {
        return Vec::new();
    };
    props
        .children()
        .filter(|n| n.is_element())
        .map(|n| {
            let value = n.text().map(str::trim).unwrap_or_default();
            (n.tag_name().name().to_string(), value.to_string())
        })
        .collect()
}

/// Dependencies under `node/dependencies`
fn read_dependency_list(node: Node<'_, '_>) -> Vec<RawDependency> {
    child_element(node, "dependencies")
        .map(|deps| children(deps, "dependency").map(read_dependency).collect())
        .unwrap_or_default()
}

fn read_dependency(node: Node<'_, '_>) -> RawDependency {
    RawDependency {
        group_id: child_text(node, "groupId"),
        artifact_id: child_text(node, "artifactId"),
        version: child_text(node, "version"),
        kind: child_text(node, "type"),
        classifier: child_text(node, "classifier"),
        scope: child_text(node, "scope"),
        optional: child_text(node, "optional"),
        system_path: child_text(node, "systemPath"),
        exclusions: child_element(node, "exclusions")
            .map(|exclusions| {
                children(exclusions, "exclusion")
                    .map(|e| RawExclusion {
                        group_id: child_text(e, "groupId"),
                        artifact_id: child_text(e, "artifactId"),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        legacy_id: child_text(node, "id"),
    }
}

/// Plugins under `node/plugins`
fn read_plugin_list(node: Node<'_, '_>) -> Vec<RawPlugin> {
    child_element(node, "plugins")
        .map(|plugins| {
            children(plugins, "plugin")
                .map(|p| RawPlugin {
                    group_id: child_text(p, "groupId"),
                    artifact_id: child_text(p, "artifactId"),
                    version: child_text(p, "version"),
                    dependencies: read_dependency_list(p),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn read_repositories(node: Node<'_, '_>, list: &str, item: &str) -> Vec<RawRepository> {
    let Some(repos) = child_element(node, list) else {
        return Vec::new();
    };
    children(repos, item)
        .map(|repo| {
            let releases = child_element(repo, "releases");
            let snapshots = child_element(repo, "snapshots");
            RawRepository {
                id: child_text(repo, "id"),
                url: child_text(repo, "url"),
                releases_enabled: releases.and_then(|n| child_text(n, "enabled")),
                releases_checksum: releases.and_then(|n| child_text(n, "checksumPolicy")),
                snapshots_enabled: snapshots.and_then(|n| child_text(n, "enabled")),
                snapshots_checksum: snapshots.and_then(|n| child_text(n, "checksumPolicy")),
            }
        })
        .collect()
}

fn read_modules(node: Node<'_, '_>) -> Vec<String> {
    child_element(node, "modules")
        .map(|modules| {
            children(modules, "module")
                .filter_map(|m| m.text())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn read_profile(node: Node<'_, '_>) -> RawProfile {
    RawProfile {
        id: child_text(node, "id"),
        activation: child_element(node, "activation").map(|a| {
            let os = child_element(a, "os");
            let property = child_element(a, "property");
            let file = child_element(a, "file");
            RawActivation {
                active_by_default: child_text(a, "activeByDefault"),
                jdk: child_text(a, "jdk"),
                os_name: os.and_then(|n| child_text(n, "name")),
                os_family: os.and_then(|n| child_text(n, "family")),
                os_arch: os.and_then(|n| child_text(n, "arch")),
                os_version: os.and_then(|n| child_text(n, "version")),
                property_name: property.and_then(|n| child_text(n, "name")),
                property_value: property.and_then(|n| child_text(n, "value")),
                file_exists: file.and_then(|n| child_text(n, "exists")),
                file_missing: file.and_then(|n| child_text(n, "missing")),
            }
        }),
        properties: read_properties(node),
        dependencies: read_dependency_list(node),
        dependency_management: child_element(node, "dependencyManagement")
            .map(read_dependency_list)
            .unwrap_or_default(),
        plugins: child_element(node, "build").map(read_plugin_list).unwrap_or_default(),
        repositories: read_repositories(node, "repositories", "repository"),
        plugin_repositories: read_repositories(node, "pluginRepositories", "pluginRepository"),
        modules: read_modules(node),
    }
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
