//! `${...}` placeholder interpolation.
//!
//! Lookup order for a key: session user properties, implicit properties
//! (`project.*`, `parent.*`, `basedir`, ...), `env.*`, then declared
//! properties layer by layer (own first, then ancestors nearest-first).
//! Values are expanded transitively. A cycle, or a chain deeper than
//! [`MAX_DEPTH`], fails only the token that started it; that token is left
//! verbatim and reported.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use pommel_core::utils::path_to_file_url;
use pommel_core::{Dependency, FailureKind, RepositoryDescriptor};

use crate::descriptor::{Descriptor, Parent, Plugin, Relocation};

/// Bound on nested property references
pub const MAX_DEPTH: usize = 10;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// A placeholder that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyIssue {
    Unresolved(String),
    Cycle(String),
}

/// Layered property environment for one descriptor
#[derive(Debug, Clone, Default)]
pub struct PropertyScope {
    /// Invocation overrides, highest precedence
    pub user: IndexMap<String, String>,
    pub implicit: IndexMap<String, String>,
    /// Backing map for `env.NAME`
    pub env: IndexMap<String, String>,
    /// Declared properties, nearest layer first
    pub declared: Vec<IndexMap<String, String>>,
}

/// Expands placeholders against a [`PropertyScope`]
#[derive(Debug, Clone, Copy)]
pub struct Interpolator<'a> {
    scope: &'a PropertyScope,
}

impl PropertyIssue {
    pub fn key(&self) -> &str {
        match self {
            PropertyIssue::Unresolved(key) | PropertyIssue::Cycle(key) => key,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PropertyIssue::Unresolved(key) => FailureKind::UnresolvedProperty { key: key.clone() },
            PropertyIssue::Cycle(key) => FailureKind::PropertyCycle { key: key.clone() },
        }
    }
}

/// Whether a string still contains a `${...}` token
pub fn has_placeholder(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

impl PropertyScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: IndexMap<String, String>) -> Self {
        self.user = user;
        self
    }

    pub fn with_env(mut self, env: IndexMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_implicit(mut self, implicit: IndexMap<String, String>) -> Self {
        self.implicit = implicit;
        self
    }

    /// Add a declared layer below the existing ones
    pub fn with_declared(mut self, layer: IndexMap<String, String>) -> Self {
        self.declared.push(layer);
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.user.get(key) {
            return Some(value);
        }
        if let Some(value) = self.implicit.get(key) {
            return Some(value);
        }
        if let Some(name) = key.strip_prefix("env.") {
            if let Some(value) = self.env.get(name) {
                return Some(value);
            }
        }
        self.declared
            .iter()
            .find_map(|layer| layer.get(key))
            .map(String::as_str)
    }
}

/// Computed properties describing a descriptor
pub fn implicit_properties(descriptor: &Descriptor, build_timestamp: &str) -> IndexMap<String, String> {
    let mut props = IndexMap::new();
    let mut put = |key: String, value: Option<&str>| {
        if let Some(value) = value {
            props.insert(key, value.to_string());
        }
    };

    let group_id = descriptor.effective_group_id();
    let version = descriptor.effective_version();
    for prefix in ["project.", "pom."] {
        put(format!("{}groupId", prefix), group_id);
        put(format!("{}artifactId", prefix), Some(&descriptor.artifact_id));
        put(format!("{}version", prefix), version);
        put(format!("{}packaging", prefix), Some(descriptor.packaging()));
        put(format!("{}name", prefix), descriptor.name.as_deref());
        put(format!("{}description", prefix), descriptor.description.as_deref());
    }
    put("groupId".to_string(), group_id);
    put("artifactId".to_string(), Some(&descriptor.artifact_id));
    put("version".to_string(), version);

    if let Some(parent) = &descriptor.parent {
        for prefix in ["project.parent.", "parent."] {
            put(format!("{}groupId", prefix), parent.group_id.as_deref());
            put(format!("{}artifactId", prefix), parent.artifact_id.as_deref());
            put(format!("{}version", prefix), parent.version.as_deref());
        }
    }

    if let Some(dir) = &descriptor.base_dir {
        let basedir = dir.display().to_string();
        put("basedir".to_string(), Some(&basedir));
        put("project.basedir".to_string(), Some(&basedir));
        let uri = path_to_file_url(dir);
        put("project.baseUri".to_string(), uri.as_deref());
    }

    put("maven.build.timestamp".to_string(), Some(build_timestamp));
    props
}

impl<'a> Interpolator<'a> {
    pub fn new(scope: &'a PropertyScope) -> Self {
        Self { scope }
    }

    /// Expand every token in `text`, recording the ones left in place
    pub fn interpolate(&self, text: &str, issues: &mut Vec<PropertyIssue>) -> String {
        if !text.contains("${") {
            return text.to_string();
        }
        let mut stack = Vec::new();
        // errors never escape the top level
        self.expand(text, &mut stack, issues)
            .unwrap_or_else(|_| text.to_string())
    }

    fn expand(
        &self,
        text: &str,
        stack: &mut Vec<String>,
        issues: &mut Vec<PropertyIssue>,
    ) -> Result<String, PropertyIssue> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(text) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            match self.resolve_key(key.as_str().trim(), stack, issues) {
                Ok(value) => out.push_str(&value),
                Err(issue @ PropertyIssue::Unresolved(_)) => {
                    record(issues, issue);
                    out.push_str(whole.as_str());
                }
                Err(cycle) => {
                    if !stack.is_empty() {
                        return Err(cycle);
                    }
                    record(issues, cycle);
                    out.push_str(whole.as_str());
                }
            }
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn resolve_key(
        &self,
        key: &str,
        stack: &mut Vec<String>,
        issues: &mut Vec<PropertyIssue>,
    ) -> Result<String, PropertyIssue> {
        if stack.len() >= MAX_DEPTH || stack.iter().any(|k| k == key) {
            return Err(PropertyIssue::Cycle(key.to_string()));
        }
        let raw = self
            .scope
            .lookup(key)
            .ok_or_else(|| PropertyIssue::Unresolved(key.to_string()))?;
        stack.push(key.to_string());
        let result = self.expand(raw, stack, issues);
        stack.pop();
        result
    }

    fn opt(&self, value: &Option<String>, issues: &mut Vec<PropertyIssue>) -> Option<String> {
        value.as_ref().map(|v| self.interpolate(v, issues))
    }

    /// Rewrite every string field that can carry placeholders.
    ///
    /// Profiles are left as declared; active ones are injected before this
    /// runs.
    pub fn descriptor(&self, descriptor: &Descriptor) -> (Descriptor, Vec<PropertyIssue>) {
        let mut issues = Vec::new();
        let issues_ref = &mut issues;

        let result = Descriptor {
            model_version: descriptor.model_version.clone(),
            group_id: self.opt(&descriptor.group_id, issues_ref),
            artifact_id: self.interpolate(&descriptor.artifact_id, issues_ref),
            version: self.opt(&descriptor.version, issues_ref),
            packaging: self.opt(&descriptor.packaging, issues_ref),
            name: self.opt(&descriptor.name, issues_ref),
            description: self.opt(&descriptor.description, issues_ref),
            parent: descriptor.parent.as_ref().map(|p| self.parent(p, issues_ref)),
            properties: descriptor
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), self.interpolate(v, issues_ref)))
                .collect(),
            dependencies: self.dependencies(&descriptor.dependencies, issues_ref),
            dependency_management: self.dependencies(&descriptor.dependency_management, issues_ref),
            plugins: self.plugins(&descriptor.plugins, issues_ref),
            plugin_management: self.plugins(&descriptor.plugin_management, issues_ref),
            repositories: self.repositories(&descriptor.repositories, issues_ref),
            plugin_repositories: self.repositories(&descriptor.plugin_repositories, issues_ref),
            modules: descriptor
                .modules
                .iter()
                .map(|m| self.interpolate(m, issues_ref))
                .collect(),
            profiles: descriptor.profiles.clone(),
            relocation: descriptor.relocation.as_ref().map(|r| Relocation {
                group_id: self.opt(&r.group_id, issues_ref),
                artifact_id: self.opt(&r.artifact_id, issues_ref),
                version: self.opt(&r.version, issues_ref),
                message: r.message.clone(),
            }),
            location: descriptor.location.clone(),
            base_dir: descriptor.base_dir.clone(),
        };
        (result, issues)
    }

    /// Interpolate a parent reference (needed before the parent is located)
    pub fn parent(&self, parent: &Parent, issues: &mut Vec<PropertyIssue>) -> Parent {
        Parent {
            group_id: self.opt(&parent.group_id, issues),
            artifact_id: self.opt(&parent.artifact_id, issues),
            version: self.opt(&parent.version, issues),
            relative_path: self.opt(&parent.relative_path, issues),
        }
    }

    pub fn dependency(&self, dep: &Dependency, issues: &mut Vec<PropertyIssue>) -> Dependency {
        Dependency {
            group_id: self.interpolate(&dep.group_id, issues),
            artifact_id: self.interpolate(&dep.artifact_id, issues),
            version: self.opt(&dep.version, issues),
            kind: self.interpolate(&dep.kind, issues),
            classifier: self.opt(&dep.classifier, issues),
            scope: self.opt(&dep.scope, issues),
            optional: dep.optional,
            exclusions: dep
                .exclusions
                .iter()
                .map(|e| pommel_core::Exclusion {
                    group_id: self.interpolate(&e.group_id, issues),
                    artifact_id: self.interpolate(&e.artifact_id, issues),
                })
                .collect(),
            system_path: self.opt(&dep.system_path, issues),
        }
    }

    fn dependencies(&self, deps: &[Dependency], issues: &mut Vec<PropertyIssue>) -> Vec<Dependency> {
        deps.iter().map(|d| self.dependency(d, issues)).collect()
    }

    fn plugins(&self, plugins: &[Plugin], issues: &mut Vec<PropertyIssue>) -> Vec<Plugin> {
        plugins
            .iter()
            .map(|p| Plugin {
                group_id: self.interpolate(&p.group_id, issues),
                artifact_id: self.interpolate(&p.artifact_id, issues),
                version: self.opt(&p.version, issues),
                dependencies: self.dependencies(&p.dependencies, issues),
            })
            .collect()
    }

    fn repositories(
        &self,
        repos: &[RepositoryDescriptor],
        issues: &mut Vec<PropertyIssue>,
    ) -> Vec<RepositoryDescriptor> {
        repos
            .iter()
            .map(|r| RepositoryDescriptor {
                id: self.interpolate(&r.id, issues),
                url: self.interpolate(&r.url, issues),
                ..r.clone()
            })
            .collect()
    }
}

fn record(issues: &mut Vec<PropertyIssue>, issue: PropertyIssue) {
    if !issues.contains(&issue) {
        issues.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, &str)]) -> PropertyScope {
        PropertyScope::new().with_declared(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_transitive_resolution() {
        let s = scope(&[("a", "${b}-x"), ("b", "${c}"), ("c", "1.0")]);
        let mut issues = Vec::new();
        let out = Interpolator::new(&s).interpolate("v${a}/${c}", &mut issues);
        assert_eq!(out, "v1.0-x/1.0");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_cycle_fails_only_that_token() {
        let s = scope(&[("a", "${b}"), ("b", "${a}"), ("ok", "fine")]);
        let mut issues = Vec::new();
        let out = Interpolator::new(&s).interpolate("${a}|${ok}", &mut issues);
        assert_eq!(out, "${a}|fine");
        assert_eq!(issues, vec![PropertyIssue::Cycle("a".to_string())]);

        let mut issues = Vec::new();
        let out = Interpolator::new(&scope(&[("self", "x${self}")])).interpolate("${self}", &mut issues);
        assert_eq!(out, "${self}");
        assert_eq!(issues[0].failure_kind(), FailureKind::PropertyCycle { key: "self".into() });
    }

    #[test]
    fn test_depth_bound() {
        let pairs: Vec<(String, String)> = (0..15)
            .map(|i| (format!("p{}", i), format!("${{p{}}}", i + 1)))
            .chain(std::iter::once(("p15".to_string(), "end".to_string())))
            .collect();
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let s = scope(&refs);
        let mut issues = Vec::new();
        let out = Interpolator::new(&s).interpolate("${p0}", &mut issues);
        assert_eq!(out, "${p0}");
        assert!(matches!(issues[0], PropertyIssue::Cycle(_)));

        // a chain within the bound resolves
        let mut issues = Vec::new();
        assert_eq!(Interpolator::new(&s).interpolate("${p10}", &mut issues), "end");
    }

    #[test]
    fn test_unresolved_left_verbatim() {
        let s = scope(&[("a", "${missing}")]);
        let mut issues = Vec::new();
        let out = Interpolator::new(&s).interpolate("${a}:${other}", &mut issues);
        assert_eq!(out, "${missing}:${other}");
        assert_eq!(
            issues,
            vec![
                PropertyIssue::Unresolved("missing".to_string()),
                PropertyIssue::Unresolved("other".to_string()),
            ]
        );
    }

    #[test]
    fn test_precedence() {
        let mut s = scope(&[("k", "own"), ("project.version", "declared")]);
        let ancestor: IndexMap<String, String> = [("k", "ancestor"), ("deep", "anc")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        s = s.with_declared(ancestor);
        s.implicit.insert("project.version".into(), "implicit".into());
        s.env.insert("HOME".into(), "/home/u".into());

        let i = Interpolator::new(&s);
        let mut issues = Vec::new();
        assert_eq!(i.interpolate("${k}", &mut issues), "own");
        assert_eq!(i.interpolate("${deep}", &mut issues), "anc");
        assert_eq!(i.interpolate("${project.version}", &mut issues), "implicit");
        assert_eq!(i.interpolate("${env.HOME}", &mut issues), "/home/u");

        s.user.insert("k".into(), "user".into());
        assert_eq!(Interpolator::new(&s).interpolate("${k}", &mut issues), "user");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_implicit_properties() {
        let d = Descriptor::parse(
            r#"<project>
  <parent><groupId>org.p</groupId><artifactId>parent</artifactId><version>3</version></parent>
  <artifactId>child</artifactId>
  <name>Child</name>
</project>"#,
            "pom.xml",
        )
        .unwrap()
        .with_base_dir("/work/child");
        let props = implicit_properties(&d, "2024-01-01T00:00:00Z");
        assert_eq!(props["project.groupId"], "org.p");
        assert_eq!(props["pom.version"], "3");
        assert_eq!(props["version"], "3");
        assert_eq!(props["project.parent.artifactId"], "parent");
        assert_eq!(props["parent.version"], "3");
        assert_eq!(props["basedir"], "/work/child");
        assert_eq!(props["project.baseUri"], "file:///work/child");
        assert_eq!(props["project.name"], "Child");
        assert_eq!(props["maven.build.timestamp"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_descriptor_interpolation() {
        let d = Descriptor::parse(
            r#"<project>
  <groupId>g</groupId><artifactId>a</artifactId><version>${revision}</version>
  <properties><revision>1.4</revision><dep.version>${project.version}</dep.version></properties>
  <dependencies>
    <dependency><groupId>g</groupId><artifactId>b</artifactId><version>${dep.version}</version></dependency>
    <dependency><groupId>g</groupId><artifactId>c</artifactId><version>${nope}</version></dependency>
  </dependencies>
</project>"#,
            "pom.xml",
        )
        .unwrap();
        let s = PropertyScope::new()
            .with_implicit(implicit_properties(&d, "now"))
            .with_declared(d.properties.clone());
        let (out, issues) = Interpolator::new(&s).descriptor(&d);
        assert_eq!(out.version.as_deref(), Some("1.4"));
        assert_eq!(out.properties["dep.version"], "1.4");
        assert_eq!(out.dependencies[0].version.as_deref(), Some("1.4"));
        assert_eq!(out.dependencies[1].version.as_deref(), Some("${nope}"));
        assert_eq!(issues, vec![PropertyIssue::Unresolved("nope".into())]);
    }
}
