//! Fold strongly connected module groups into synthetic cycle nodes
//!
//! Only modules and the kinds `import`, `export` and `dependency` take part
//! in detection (untyped edges count as `dependency`). Everything else
//! passes through untouched apart from endpoint remapping.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::hierarchy::retain_live_edges;
use crate::model::{
    edge_key, EdgeKind, GraphEdge, GraphNode, GroupInfo, GroupKind, NodeId, NodeKind,
};

/// One materialised strongly connected component (always two or more members).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SccGroup {
    pub id: NodeId,
    /// Sorted member ids.
    pub member_ids: Vec<NodeId>,
    pub label: String,
}

impl SccGroup {
    pub fn from_members(mut member_ids: Vec<NodeId>) -> Self {
        member_ids.sort();
        member_ids.dedup();
        SccGroup {
            id: format!("scc:{}", member_ids.join(",")),
            label: format!("Cycle({})", member_ids.len()),
            member_ids,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleCollapse {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub groups: Vec<SccGroup>,
}

fn participates(edge: &GraphEdge) -> bool {
    matches!(
        edge.kind.unwrap_or(EdgeKind::Dependency),
        EdgeKind::Import | EdgeKind::Export | EdgeKind::Dependency
    )
}

/// Detect module cycles, sorted by group id.
pub fn find_module_cycles(nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<SccGroup> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes.iter().filter(|n| n.kind == NodeKind::Module) {
        index
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node.id.as_str()));
    }
    for edge in edges.iter().filter(|e| participates(e)) {
        if let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            graph.add_edge(s, t, ());
        }
    }

    let mut groups: Vec<SccGroup> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            SccGroup::from_members(component.into_iter().map(|idx| graph[idx].to_string()).collect())
        })
        .collect();
    groups.sort_by(|a, b| a.id.cmp(&b.id));
    groups
}

/// Collapse every module cycle into a group node.
///
/// Members are reparented under their group, edges inside a group are
/// dropped, and boundary-crossing edges are remapped to the group and
/// deduplicated by `(source, target, kind)` keeping the first-seen payload.
#[instrument(skip_all, fields(nodes = nodes.len(), edges = edges.len()))]
pub fn collapse_cycles(nodes: &[GraphNode], edges: &[GraphEdge]) -> CycleCollapse {
    let groups = find_module_cycles(nodes, edges);
    if groups.is_empty() {
        return CycleCollapse {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
            groups,
        };
    }

    let mut group_of: HashMap<&str, usize> = HashMap::new();
    for (i, group) in groups.iter().enumerate() {
        for member in &group.member_ids {
            group_of.insert(member.as_str(), i);
        }
    }

    let parents: HashMap<&str, Option<&NodeId>> =
        nodes.iter().map(|n| (n.id.as_str(), n.parent_id.as_ref())).collect();

    let mut out_nodes = Vec::with_capacity(nodes.len() + groups.len());
    let mut emitted: HashSet<usize> = HashSet::new();
    for node in nodes {
        let Some(&gi) = group_of.get(node.id.as_str()) else {
            out_nodes.push(node.clone());
            continue;
        };
        if emitted.insert(gi) {
            out_nodes.push(group_node(&groups[gi], &parents));
        }
        let mut member = node.clone();
        member.parent_id = Some(groups[gi].id.clone());
        member.extent_parent = true;
        out_nodes.push(member);
    }

    let mut out_edges: Vec<GraphEdge> = Vec::with_capacity(edges.len());
    let mut seen: HashSet<String> = HashSet::new();
    for edge in edges {
        let sg = group_of.get(edge.source.as_str()).copied();
        let tg = group_of.get(edge.target.as_str()).copied();
        if sg.is_some() && sg == tg {
            continue;
        }
        if sg.is_none() && tg.is_none() {
            if seen.insert(edge.key()) {
                out_edges.push(edge.clone());
            }
            continue;
        }
        let source = sg.map_or_else(|| edge.source.clone(), |i| groups[i].id.clone());
        let target = tg.map_or_else(|| edge.target.clone(), |i| groups[i].id.clone());
        let key = edge_key(&source, &target, edge.kind);
        if !seen.insert(key.clone()) {
            continue;
        }
        let mut remapped = edge.clone();
        remapped.id = key;
        if sg.is_some() {
            remapped.data.source_handle = None;
        }
        if tg.is_some() {
            remapped.data.target_handle = None;
        }
        remapped.source = source;
        remapped.target = target;
        out_edges.push(remapped);
    }

    tracing::debug!(groups = groups.len(), "collapsed module cycles");
    let out_edges = retain_live_edges(&out_nodes, out_edges);
    CycleCollapse {
        nodes: out_nodes,
        edges: out_edges,
        groups,
    }
}

fn group_node(group: &SccGroup, parents: &HashMap<&str, Option<&NodeId>>) -> GraphNode {
    // The group inherits a parent only when every member agrees on it.
    let mut member_parents = group
        .member_ids
        .iter()
        .map(|m| parents.get(m.as_str()).copied().flatten());
    let first = member_parents.next().flatten();
    let shared = member_parents.all(|p| p == first);

    let mut node = GraphNode::new(group.id.clone(), NodeKind::Group, group.label.clone());
    node.parent_id = if shared { first.cloned() } else { None };
    node.data.group = Some(GroupInfo {
        kind: GroupKind::Cycle,
        member_ids: group.member_ids.clone(),
    });
    node.data.child_count = Some(group.member_ids.len());
    node
}
