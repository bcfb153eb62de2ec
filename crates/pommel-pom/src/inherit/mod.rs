//! Parent/child merging.
//!
//! Scalars: the child wins when present, otherwise the ancestor value is
//! inherited. Keyed collections (properties, dependencies,
//! dependencyManagement, plugins, pluginManagement, repositories): union,
//! child entries first and overriding ancestor entries with the same key.
//! Profiles concatenate child first. Identity-like fields (`parent`,
//! `modules`, `relocation`, location) always come from the child.
//!
//! The merge is associative, so a chain can be folded root to leaf one
//! link at a time.

use indexmap::IndexMap;

use pommel_core::{Dependency, RepositoryDescriptor};

use crate::descriptor::{Descriptor, Plugin, Profile};

/// Merge `child` on top of an already merged `parent`
pub fn merge_parent(parent: &Descriptor, child: &Descriptor) -> Descriptor {
    Descriptor {
        model_version: child.model_version.clone().or_else(|| parent.model_version.clone()),
        group_id: child
            .group_id
            .clone()
            .or_else(|| parent.group_id.clone()),
        artifact_id: child.artifact_id.clone(),
        version: child.version.clone().or_else(|| parent.version.clone()),
        packaging: child.packaging.clone().or_else(|| parent.packaging.clone()),
        name: child.name.clone().or_else(|| parent.name.clone()),
        description: child.description.clone().or_else(|| parent.description.clone()),
        parent: child.parent.clone(),
        properties: merge_properties(&parent.properties, &child.properties),
        dependencies: merge_keyed(&parent.dependencies, &child.dependencies, Dependency::management_key),
        dependency_management: merge_keyed(
            &parent.dependency_management,
            &child.dependency_management,
            Dependency::management_key,
        ),
        plugins: merge_keyed(&parent.plugins, &child.plugins, Plugin::key),
        plugin_management: merge_keyed(&parent.plugin_management, &child.plugin_management, Plugin::key),
        repositories: merge_keyed(&parent.repositories, &child.repositories, repository_key),
        plugin_repositories: merge_keyed(
            &parent.plugin_repositories,
            &child.plugin_repositories,
            repository_key,
        ),
        modules: child.modules.clone(),
        profiles: concat_profiles(&parent.profiles, &child.profiles),
        relocation: child.relocation.clone(),
        location: child.location.clone(),
        base_dir: child.base_dir.clone(),
    }
}

/// Fold a chain given root first
pub fn merge_chain<'a>(chain: impl IntoIterator<Item = &'a Descriptor>) -> Option<Descriptor> {
    let mut iter = chain.into_iter();
    let root = iter.next()?.clone();
    Some(iter.fold(root, |merged, child| merge_parent(&merged, child)))
}

fn merge_properties(
    parent: &IndexMap<String, String>,
    child: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    let mut merged = child.clone();
    for (key, value) in parent {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Child entries in order, then ancestor entries whose key the child lacks
pub(crate) fn merge_keyed<T: Clone>(parent: &[T], child: &[T], key: impl Fn(&T) -> String) -> Vec<T> {
    let mut merged: IndexMap<String, T> = IndexMap::with_capacity(parent.len() + child.len());
    for item in child {
        merged.entry(key(item)).or_insert_with(|| item.clone());
    }
    for item in parent {
        merged.entry(key(item)).or_insert_with(|| item.clone());
    }
    merged.into_values().collect()
}

fn repository_key(repository: &RepositoryDescriptor) -> String {
    repository.id.clone()
}

fn concat_profiles(parent: &[Profile], child: &[Profile]) -> Vec<Profile> {
    child.iter().chain(parent.iter()).cloned().collect()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_descriptor() -> impl Strategy<Value = Descriptor> {
        (
            prop::option::of(prop::sample::select(vec!["g1", "g2"])),
            prop::option::of(prop::sample::select(vec!["1.0", "2.0", "3.0"])),
            prop::collection::vec((0u8..4, prop::sample::select(vec!["x", "y", "z"])), 0..4),
            prop::collection::vec((0u8..4, prop::sample::select(vec!["1", "2"])), 0..4),
        )
            .prop_map(|(group, version, props, managed)| {
                let mut d = Descriptor::parse("<project><artifactId>a</artifactId></project>", "gen")
                    .expect("fixture parses");
                d.group_id = group.map(str::to_string);
                d.version = version.map(str::to_string);
                for (k, v) in props {
                    d.properties.insert(format!("p{}", k), v.to_string());
                }
                for (k, v) in managed {
                    let dep = Dependency::new("m", format!("lib{}", k), Some(v));
                    if d.managed(&dep).is_none() {
                        d.dependency_management.push(dep);
                    }
                }
                d
            })
    }

    proptest! {
        #[test]
        fn parent_merge_is_associative(a in arb_descriptor(), b in arb_descriptor(), c in arb_descriptor()) {
            let left = merge_parent(&merge_parent(&a, &b), &c);
            let right = merge_parent(&a, &merge_parent(&b, &c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn merging_without_parent_content_is_identity(c in arb_descriptor()) {
            let empty = Descriptor::parse("<project><artifactId>root</artifactId></project>", "gen").unwrap();
            let merged = merge_parent(&empty, &c);
            prop_assert_eq!(merged, c);
        }
    }
}
