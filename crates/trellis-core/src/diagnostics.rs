//! Degree statistics and per-node diagnostic annotations

use std::collections::{HashMap, HashSet};

use crate::hierarchy::ParentMap;
use crate::model::{EdgeKind, GraphEdge, GraphNode, NodeDiagnostics, NodeId};

/// Undirected degree per node. Containment edges never count; hidden
/// edges count only when `include_hidden` is set.
pub fn degree_counts(edges: &[GraphEdge], include_hidden: bool) -> HashMap<NodeId, usize> {
    let mut degrees: HashMap<NodeId, usize> = HashMap::new();
    for edge in edges {
        if edge.kind == Some(EdgeKind::Contains) || (edge.hidden && !include_hidden) {
            continue;
        }
        *degrees.entry(edge.source.clone()).or_default() += 1;
        if edge.target != edge.source {
            *degrees.entry(edge.target.clone()).or_default() += 1;
        }
    }
    degrees
}

/// Add every non-group node's degree to each of its synthetic group
/// ancestors in `hierarchy`.
pub fn roll_up_groups(hierarchy: &[GraphNode], degrees: &mut HashMap<NodeId, usize>) {
    let parents = ParentMap::from_nodes(hierarchy);
    let groups: HashSet<&str> = hierarchy
        .iter()
        .filter(|n| n.data.group.is_some())
        .map(|n| n.id.as_str())
        .collect();
    if groups.is_empty() {
        return;
    }
    let mut rolled: HashMap<NodeId, usize> = HashMap::new();
    for node in hierarchy.iter().filter(|n| n.data.group.is_none()) {
        let Some(&degree) = degrees.get(&node.id) else {
            continue;
        };
        for ancestor in parents.ancestors(&node.id) {
            if groups.contains(ancestor.as_str()) {
                *rolled.entry(ancestor.clone()).or_default() += degree;
            }
        }
    }
    for (id, extra) in rolled {
        *degrees.entry(id).or_default() += extra;
    }
}

/// Everything `annotate` needs besides the nodes themselves.
#[derive(Debug, Default)]
pub struct DiagnosticInputs {
    pub current_degree: HashMap<NodeId, usize>,
    pub global_degree: HashMap<NodeId, usize>,
    pub test_files: HashSet<NodeId>,
    pub external_dependencies: HashMap<NodeId, Vec<String>>,
}

pub fn annotate(nodes: &mut [GraphNode], inputs: &DiagnosticInputs) {
    for node in nodes.iter_mut() {
        let external = inputs
            .external_dependencies
            .get(&node.id)
            .cloned()
            .unwrap_or_default();
        node.data.diagnostics = Some(NodeDiagnostics {
            is_test_file: inputs.test_files.contains(&node.id),
            orphan_current: inputs.current_degree.get(&node.id).copied().unwrap_or(0) == 0,
            orphan_global: inputs.global_degree.get(&node.id).copied().unwrap_or(0) == 0,
            external_dependency_count: external.len(),
            external_dependencies: external,
        });
    }
}
