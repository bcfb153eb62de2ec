//! Profile activation and injection.
//!
//! Whether a profile is active depends on the environment, so activation is
//! an injected [`ProfileActivator`]. [`DefaultActivator`] implements the
//! usual rules: explicit ids, `activeByDefault`, and `property`, `jdk`,
//! `os` and `file` conditions (all declared conditions must hold).
//!
//! Active profiles are injected into their own descriptor before
//! inheritance: properties override base keys, keyed entries replace base
//! entries in place, and new entries are appended after the base ones.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use pommel_core::{Dependency, RepositoryDescriptor, Version, VersionRange};

use crate::descriptor::{Activation, Descriptor, FileActivation, OsActivation, Plugin, Profile, PropertyActivation};

/// Session-wide inputs to activation
#[derive(Debug, Clone, Default)]
pub struct ActivationContext {
    /// Profile ids forced on (`-P id`)
    pub active_ids: Vec<String>,
    /// Profile ids forced off (`-P !id`)
    pub inactive_ids: Vec<String>,
    /// User and system properties visible to `property` conditions
    pub properties: IndexMap<String, String>,
    pub jdk_version: Option<String>,
    pub os_name: String,
    pub os_family: String,
    pub os_arch: String,
    pub os_version: Option<String>,
}

/// Injected activation predicate
pub trait ProfileActivator: Send + Sync {
    /// Whether `profile` is active. `base_dir` is the directory of the
    /// declaring descriptor, if it is file-backed.
    fn is_active(&self, profile: &Profile, context: &ActivationContext, base_dir: Option<&Path>) -> bool;
}

/// Standard activation rules
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultActivator;

impl ActivationContext {
    /// Context describing the current host
    pub fn from_host() -> Self {
        let os = std::env::consts::OS;
        let family = match os {
            "windows" => "windows",
            "macos" => "mac",
            _ => "unix",
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "x86",
            other => other,
        };
        Self {
            os_name: if os == "macos" { "mac os x".to_string() } else { os.to_string() },
            os_family: family.to_string(),
            os_arch: arch.to_string(),
            ..Self::default()
        }
    }

    /// Split `-P` style ids into active and `!`-prefixed inactive ids
    pub fn with_profile_ids<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        for id in ids.into_iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()) {
            match id.strip_prefix('!').or_else(|| id.strip_prefix('-')) {
                Some(inactive) => self.inactive_ids.push(inactive.to_string()),
                None => self.active_ids.push(id.to_string()),
            }
        }
        self
    }

    pub fn with_properties(mut self, properties: IndexMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_jdk(mut self, version: impl Into<String>) -> Self {
        self.jdk_version = Some(version.into());
        self
    }
}

fn negated(pattern: &str) -> (bool, &str) {
    match pattern.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, pattern.trim()),
    }
}

impl DefaultActivator {
    fn jdk_matches(spec: &str, context: &ActivationContext) -> bool {
        let Some(jdk) = context.jdk_version.as_deref() else {
            return negated(spec).0;
        };
        if VersionRange::is_range(spec) {
            return match (VersionRange::parse(spec), Version::parse(jdk)) {
                (Ok(range), Ok(version)) => range.contains(&version),
                _ => false,
            };
        }
        let (negate, prefix) = negated(spec);
        jdk.starts_with(prefix) != negate
    }

    fn os_matches(os: &OsActivation, context: &ActivationContext) -> bool {
        let check = |pattern: &Option<String>, actual: &str| match pattern {
            Some(pattern) => {
                let (negate, value) = negated(pattern);
                value.eq_ignore_ascii_case(actual) != negate
            }
            None => true,
        };
        let family_ok = match &os.family {
            Some(pattern) => {
                let (negate, value) = negated(pattern);
                let value = value.to_ascii_lowercase();
                let matches = match value.as_str() {
                    "unix" => context.os_family == "unix" || context.os_family == "mac",
                    other => context.os_family.eq_ignore_ascii_case(other),
                };
                matches != negate
            }
            None => true,
        };
        family_ok
            && check(&os.name, &context.os_name)
            && check(&os.arch, &context.os_arch)
            && check(&os.version, context.os_version.as_deref().unwrap_or_default())
    }

    fn property_matches(property: &PropertyActivation, context: &ActivationContext) -> bool {
        let (absent, name) = negated(&property.name);
        let actual = context.properties.get(name);
        if absent {
            return actual.is_none();
        }
        match &property.value {
            None => actual.is_some(),
            Some(expected) => {
                let (negate, expected) = negated(expected);
                (actual.map(String::as_str) == Some(expected)) != negate
            }
        }
    }

    fn file_matches(file: &FileActivation, base_dir: Option<&Path>) -> bool {
        let resolve = |path: &str| -> PathBuf {
            let base = base_dir.map(|b| b.display().to_string()).unwrap_or_default();
            let expanded = path
                .replace("${basedir}", &base)
                .replace("${project.basedir}", &base);
            let candidate = PathBuf::from(&expanded);
            match base_dir {
                Some(dir) if candidate.is_relative() => dir.join(candidate),
                _ => candidate,
            }
        };
        if let Some(exists) = &file.exists {
            if !resolve(exists).exists() {
                return false;
            }
        }
        if let Some(missing) = &file.missing {
            if resolve(missing).exists() {
                return false;
            }
        }
        true
    }

    fn conditions_hold(activation: &Activation, context: &ActivationContext, base_dir: Option<&Path>) -> bool {
        let mut any = false;
        if let Some(jdk) = &activation.jdk {
            any = true;
            if !Self::jdk_matches(jdk, context) {
                return false;
            }
        }
        if let Some(os) = &activation.os {
            any = true;
            if !Self::os_matches(os, context) {
                return false;
            }
        }
        if let Some(property) = &activation.property {
            any = true;
            if !Self::property_matches(property, context) {
                return false;
            }
        }
        if let Some(file) = &activation.file {
            any = true;
            if !Self::file_matches(file, base_dir) {
                return false;
            }
        }
        any
    }
}

impl ProfileActivator for DefaultActivator {
    fn is_active(&self, profile: &Profile, context: &ActivationContext, base_dir: Option<&Path>) -> bool {
        if context.inactive_ids.iter().any(|id| *id == profile.id) {
            return false;
        }
        if context.active_ids.iter().any(|id| *id == profile.id) {
            return true;
        }
        match &profile.activation {
            Some(activation) => Self::conditions_hold(activation, context, base_dir),
            None => false,
        }
    }
}

/// Profiles of one descriptor that apply. `activeByDefault` profiles only
/// apply when nothing else in the same descriptor is active.
pub fn active_profiles<'d>(
    descriptor: &'d Descriptor,
    activator: &dyn ProfileActivator,
    context: &ActivationContext,
) -> Vec<&'d Profile> {
    let base_dir = descriptor.base_dir.as_deref();
    let active: Vec<&Profile> = descriptor
        .profiles
        .iter()
        .filter(|p| activator.is_active(p, context, base_dir))
        .collect();
    if !active.is_empty() {
        return active;
    }
    descriptor
        .profiles
        .iter()
        .filter(|p| p.activation.as_ref().map(|a| a.active_by_default).unwrap_or(false))
        .filter(|p| !context.inactive_ids.iter().any(|id| *id == p.id))
        .collect()
}

/// Apply the active profiles of a descriptor to it. Returns the injected
/// descriptor and the ids that were applied.
pub fn inject_profiles(
    descriptor: &Descriptor,
    activator: &dyn ProfileActivator,
    context: &ActivationContext,
) -> (Descriptor, Vec<String>) {
    let active = active_profiles(descriptor, activator, context);
    if active.is_empty() {
        return (descriptor.clone(), Vec::new());
    }

    let mut result = descriptor.clone();
    let mut ids = Vec::with_capacity(active.len());
    for profile in active {
        tracing::debug!("activating profile {} in {}", profile.id, descriptor.location);
        for (key, value) in &profile.properties {
            result.properties.insert(key.clone(), value.clone());
        }
        overlay_keyed(&mut result.dependencies, &profile.dependencies, Dependency::management_key);
        overlay_keyed(
            &mut result.dependency_management,
            &profile.dependency_management,
            Dependency::management_key,
        );
        overlay_keyed(&mut result.plugins, &profile.plugins, Plugin::key);
        overlay_keyed(&mut result.repositories, &profile.repositories, |r: &RepositoryDescriptor| r.id.clone());
        overlay_keyed(
            &mut result.plugin_repositories,
            &profile.plugin_repositories,
            |r: &RepositoryDescriptor| r.id.clone(),
        );
        for module in &profile.modules {
            if !result.modules.contains(module) {
                result.modules.push(module.clone());
            }
        }
        ids.push(profile.id.clone());
    }
    (result, ids)
}

/// Replace entries with matching keys in place, append the rest
fn overlay_keyed<T: Clone>(base: &mut Vec<T>, overlay: &[T], key: impl Fn(&T) -> String) {
    for item in overlay {
        let k = key(item);
        match base.iter_mut().find(|existing| key(existing) == k) {
            Some(existing) => *existing = item.clone(),
            None => base.push(item.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<project>
  <groupId>g</groupId><artifactId>a</artifactId><version>1</version>
  <properties><mode>slow</mode></properties>
  <dependencies>
    <dependency><groupId>g</groupId><artifactId>base</artifactId><version>1</version></dependency>
  </dependencies>
  <profiles>
    <profile>
      <id>default</id>
      <activation><activeByDefault>true</activeByDefault></activation>
      <properties><mode>default</mode></properties>
    </profile>
    <profile>
      <id>ci</id>
      <activation><property><name>env</name><value>ci</value></property></activation>
      <properties><mode>fast</mode></properties>
      <dependencies>
        <dependency><groupId>g</groupId><artifactId>base</artifactId><version>2</version></dependency>
        <dependency><groupId>g</groupId><artifactId>extra</artifactId><version>1</version></dependency>
      </dependencies>
    </profile>
    <profile>
      <id>modern-jdk</id>
      <activation><jdk>[17,)</jdk><os><family>!windows</family></os></activation>
    </profile>
  </profiles>
</project>"#;

    fn descriptor() -> Descriptor {
        Descriptor::parse(POM, "pom.xml").unwrap()
    }

    fn linux() -> ActivationContext {
        ActivationContext {
            os_name: "linux".into(),
            os_family: "unix".into(),
            os_arch: "amd64".into(),
            ..ActivationContext::default()
        }
    }

    #[test]
    fn test_active_by_default_only_when_nothing_else() {
        let d = descriptor();
        let (injected, ids) = inject_profiles(&d, &DefaultActivator, &linux());
        assert_eq!(ids, vec!["default".to_string()]);
        assert_eq!(injected.properties["mode"], "default");

        let ctx = linux().with_properties([("env".to_string(), "ci".to_string())].into_iter().collect());
        let (injected, ids) = inject_profiles(&d, &DefaultActivator, &ctx);
        assert_eq!(ids, vec!["ci".to_string()]);
        assert_eq!(injected.properties["mode"], "fast");
    }

    #[test]
    fn test_injection_order_and_override() {
        let d = descriptor();
        let ctx = linux().with_profile_ids(["ci"]);
        let (injected, _) = inject_profiles(&d, &DefaultActivator, &ctx);
        let deps: Vec<_> = injected
            .dependencies
            .iter()
            .map(|d| (d.artifact_id.as_str(), d.version.as_deref().unwrap()))
            .collect();
        assert_eq!(deps, vec![("base", "2"), ("extra", "1")]);
    }

    #[test]
    fn test_explicit_deactivation() {
        let d = descriptor();
        let ctx = linux().with_profile_ids(["!default"]);
        let (injected, ids) = inject_profiles(&d, &DefaultActivator, &ctx);
        assert!(ids.is_empty());
        assert_eq!(injected, d);
    }

    #[test]
    fn test_jdk_and_os_conditions() {
        let d = descriptor();
        let ctx = linux().with_jdk("17.0.2");
        let (_, ids) = inject_profiles(&d, &DefaultActivator, &ctx);
        assert_eq!(ids, vec!["modern-jdk".to_string()]);

        let mut windows = linux().with_jdk("21");
        windows.os_family = "windows".into();
        let (_, ids) = inject_profiles(&d, &DefaultActivator, &windows);
        assert_eq!(ids, vec!["default".to_string()]);

        let old = linux().with_jdk("11.0.1");
        let (_, ids) = inject_profiles(&d, &DefaultActivator, &old);
        assert_eq!(ids, vec!["default".to_string()]);
    }

    #[test]
    fn test_property_negation() {
        let ctx = linux().with_properties([("skip".to_string(), "yes".to_string())].into_iter().collect());
        let absent = PropertyActivation { name: "!skip".into(), value: None };
        assert!(!DefaultActivator::property_matches(&absent, &ctx));
        let other_value = PropertyActivation { name: "skip".into(), value: Some("!no".into()) };
        assert!(DefaultActivator::property_matches(&other_value, &ctx));
        let unset = PropertyActivation { name: "missing".into(), value: Some("!x".into()) };
        assert!(DefaultActivator::property_matches(&unset, &ctx));
    }

    #[test]
    fn test_jdk_prefix() {
        let ctx = linux().with_jdk("1.8.0_292");
        assert!(DefaultActivator::jdk_matches("1.8", &ctx));
        assert!(!DefaultActivator::jdk_matches("!1.8", &ctx));
        assert!(DefaultActivator::jdk_matches("!11", &ctx));
        assert!(DefaultActivator::jdk_matches("!11", &linux()));
        assert!(!DefaultActivator::jdk_matches("11", &linux()));
    }

    #[test]
    fn test_file_activation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let exists = FileActivation { exists: Some("${basedir}/marker".into()), missing: None };
        assert!(DefaultActivator::file_matches(&exists, Some(dir.path())));
        let missing = FileActivation { exists: None, missing: Some("marker".into()) };
        assert!(!DefaultActivator::file_matches(&missing, Some(dir.path())));
        let relative = FileActivation { exists: Some("nope".into()), missing: None };
        assert!(!DefaultActivator::file_matches(&relative, Some(dir.path())));
    }

    #[test]
    fn test_profile_id_parsing() {
        let ctx = ActivationContext::default().with_profile_ids(["a,!b", "-c", " d "]);
        assert_eq!(ctx.active_ids, vec!["a", "d"]);
        assert_eq!(ctx.inactive_ids, vec!["b", "c"]);
    }

    #[test]
    fn test_host_context() {
        let ctx = ActivationContext::from_host();
        assert!(!ctx.os_family.is_empty());
        assert!(!ctx.os_arch.is_empty());
    }
}
