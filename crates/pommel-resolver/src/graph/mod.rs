//! Dependency graph types
//!
//! [`DependencyGraph`] is the petgraph view of one resolved scope: a node
//! per selected coordinate and an edge from each node to the dependencies
//! it brought in. [`ResolvedDependencyGraph`] is the flat per-scope output
//! consumers read.

use dashmap::DashMap;
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use pommel_core::{Coordinate, GroupArtifact, Scope};

/// A selected coordinate in the dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub coordinate: Coordinate,
    /// Effective scope; `None` for the root project
    pub scope: Option<Scope>,
    /// 0 for direct dependencies
    pub depth: usize,
    pub optional: bool,
}

/// Inclusion of a dependency by the node that declared it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Version text as declared, before management and selection
    pub declared_version: Option<String>,
    pub scope: Scope,
}

/// Dependency tree backed by petgraph
#[derive(Debug)]
pub struct DependencyGraph {
    /// Underlying directed graph
    graph: DiGraph<DependencyNode, DependencyEdge>,
    /// Map from coordinate to NodeIndex for fast lookups
    node_map: DashMap<Coordinate, NodeIndex>,
    root: NodeIndex,
}

impl DependencyGraph {
    /// Create a graph holding only the root project
    pub fn new(root: Coordinate) -> Self {
        let mut graph = DiGraph::new();
        let node_map = DashMap::new();
        let index = graph.add_node(DependencyNode {
            coordinate: root.clone(),
            scope: None,
            depth: 0,
            optional: false,
        });
        node_map.insert(root, index);
        Self {
            graph,
            node_map,
            root: index,
        }
    }

    pub fn root(&self) -> &Coordinate {
        &self.graph[self.root].coordinate
    }

    /// Add a node; an existing coordinate keeps its first node
    pub fn add_node(&mut self, node: DependencyNode) -> NodeIndex {
        if let Some(existing) = self.node_map.get(&node.coordinate) {
            return *existing;
        }
        let coordinate = node.coordinate.clone();
        let index = self.graph.add_node(node);
        self.node_map.insert(coordinate, index);
        index
    }

    /// Add an edge between two existing nodes
    pub fn add_dependency(
        &mut self,
        from: &Coordinate,
        to: &Coordinate,
        edge: DependencyEdge,
    ) -> Result<(), String> {
        let from_index = *self
            .node_map
            .get(from)
            .ok_or_else(|| format!("Node not found: {}", from))?;
        let to_index = *self
            .node_map
            .get(to)
            .ok_or_else(|| format!("Node not found: {}", to))?;
        self.graph.add_edge(from_index, to_index, edge);
        Ok(())
    }

    pub fn get_node(&self, coordinate: &Coordinate) -> Option<&DependencyNode> {
        let index = self.node_map.get(coordinate)?;
        self.graph.node_weight(*index)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.graph.node_weights()
    }

    /// Direct children of a node, in the order they were added
    pub fn children(&self, coordinate: &Coordinate) -> Vec<(&DependencyNode, &DependencyEdge)> {
        let Some(index) = self.node_map.get(coordinate).map(|i| *i) else {
            return Vec::new();
        };
        self.children_of(index)
            .into_iter()
            .map(|(child, edge)| (&self.graph[child], edge))
            .collect()
    }

    fn children_of(&self, index: NodeIndex) -> Vec<(NodeIndex, &DependencyEdge)> {
        let mut edges: Vec<_> = self.graph.edges(index).collect();
        // petgraph iterates outgoing edges newest first
        edges.sort_by_key(|edge| edge.id());
        edges.into_iter().map(|edge| (edge.target(), edge.weight())).collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Detect cycles in the graph
    pub fn detect_cycles(&self) -> Result<(), Vec<Coordinate>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(self.extract_cycle_path(cycle.node_id())),
        }
    }

    /// Follow first edges from a node known to be on a cycle
    fn extract_cycle_path(&self, start: NodeIndex) -> Vec<Coordinate> {
        let mut visited = HashSet::new();
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut current = start;
        while visited.insert(current) {
            path.push(current);
            match self.children_of(current).first() {
                Some((next, _)) => current = *next,
                None => break,
            }
        }
        let begin = path.iter().position(|index| *index == current).unwrap_or(0);
        path[begin..]
            .iter()
            .map(|index| self.graph[*index].coordinate.clone())
            .collect()
    }

    /// Format cycle as "a -> b -> a"
    pub fn format_cycle(cycle: &[Coordinate]) -> String {
        let mut names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        names.join(" -> ")
    }

    pub fn validate_no_cycles(&self) -> Result<(), String> {
        self.detect_cycles()
            .map_err(|cycle| format!("Circular dependency detected: {}", Self::format_cycle(&cycle)))
    }

    /// Render the tree the way build tools print it:
    ///
    /// ```text
    /// com.example:app:1.0
    /// +- com.example:lib:2.0:compile
    /// |  \- com.example:util:1.1:compile
    /// \- junit:junit:4.13:test
    /// ```
    pub fn render_tree(&self) -> String {
        let mut out = self.graph[self.root].coordinate.to_string();
        out.push('\n');
        let mut visited = HashSet::from([self.root]);
        self.render_children(self.root, "", &mut visited, &mut out);
        out
    }

    fn render_children(&self, index: NodeIndex, prefix: &str, visited: &mut HashSet<NodeIndex>, out: &mut String) {
        let children = self.children_of(index);
        let count = children.len();
        for (position, (child, _)) in children.into_iter().enumerate() {
            let last = position + 1 == count;
            let node = &self.graph[child];
            out.push_str(prefix);
            out.push_str(if last { "\\- " } else { "+- " });
            out.push_str(&node.coordinate.to_string());
            if let Some(scope) = node.scope {
                out.push(':');
                out.push_str(scope.as_str());
            }
            if node.optional {
                out.push_str(" (optional)");
            }
            out.push('\n');
            if visited.insert(child) {
                let nested = format!("{}{}", prefix, if last { "   " } else { "|  " });
                self.render_children(child, &nested, visited, out);
            }
        }
    }
}

/// One selected dependency in a scope bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub depth: usize,
    pub optional: bool,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

/// Per-scope resolved dependency sets.
///
/// Holds identities only. `declared_by` maps each selected coordinate to
/// the descriptor whose declaration won mediation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedDependencyGraph {
    buckets: IndexMap<Scope, Vec<ResolvedEntry>>,
    #[serde(skip)]
    declared_by: IndexMap<Coordinate, Coordinate>,
}

impl ResolvedEntry {
    pub fn group_artifact(&self) -> GroupArtifact {
        self.coordinate.group_artifact()
    }

    /// `groupId:artifactId:type[:classifier]`; variants of one artifact
    /// with a different type or classifier are separate entries
    pub fn conflict_key(&self) -> String {
        let base = format!("{}:{}:{}", self.coordinate.group_id, self.coordinate.artifact_id, self.kind);
        match &self.classifier {
            Some(classifier) => format!("{}:{}", base, classifier),
            None => base,
        }
    }
}

impl ResolvedDependencyGraph {
    /// Empty graph with every output bucket present
    pub fn new() -> Self {
        Self {
            buckets: Scope::BUCKETS.iter().map(|scope| (*scope, Vec::new())).collect(),
            declared_by: IndexMap::new(),
        }
    }

    /// Append an entry to a bucket and return `true`. The entry is ignored
    /// when its conflict key is already present, or when another variant
    /// of the same groupId:artifactId was selected at a different version.
    pub fn insert(&mut self, bucket: Scope, entry: ResolvedEntry, declared_by: Coordinate) -> bool {
        let key = entry.conflict_key();
        let entries = self.buckets.entry(bucket).or_default();
        let clashes = entries.iter().any(|e| {
            e.conflict_key() == key
                || (e.group_artifact() == entry.group_artifact() && e.coordinate.version != entry.coordinate.version)
        });
        if clashes {
            return false;
        }
        self.declared_by.entry(entry.coordinate.clone()).or_insert(declared_by);
        entries.push(entry);
        true
    }

    /// Entries of a bucket in resolution order
    pub fn entries(&self, bucket: Scope) -> &[ResolvedEntry] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn coordinates(&self, bucket: Scope) -> Vec<Coordinate> {
        self.entries(bucket).iter().map(|e| e.coordinate.clone()).collect()
    }

    pub fn contains(&self, bucket: Scope, coordinate: &Coordinate) -> bool {
        self.entries(bucket).iter().any(|e| &e.coordinate == coordinate)
    }

    /// First entry of `ga` in a bucket, whatever its type or classifier
    pub fn find(&self, bucket: Scope, ga: &GroupArtifact) -> Option<&ResolvedEntry> {
        self.entries(bucket).iter().find(|e| &e.group_artifact() == ga)
    }

    /// Entry with the exact `groupId:artifactId:type[:classifier]` key
    pub fn find_variant(&self, bucket: Scope, key: &str) -> Option<&ResolvedEntry> {
        self.entries(bucket).iter().find(|e| e.conflict_key() == key)
    }

    /// Coordinate of the descriptor that declared the selected dependency
    pub fn declared_by(&self, coordinate: &Coordinate) -> Option<&Coordinate> {
        self.declared_by.get(coordinate)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (Scope, &[ResolvedEntry])> {
        self.buckets.iter().map(|(scope, entries)| (*scope, entries.as_slice()))
    }

    /// Total entries across buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
