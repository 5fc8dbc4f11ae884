//! Hide the contents of collapsed folders and lift their edges

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::hierarchy::{retain_live_edges, ParentMap};
use crate::model::{edge_key, GraphEdge, GraphNode, HighwaySegment, NodeId};

/// What collapsing one visible folder did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCollapseMeta {
    pub folder_id: NodeId,
    /// Every hidden descendant; never contains `folder_id`.
    pub child_ids: Vec<NodeId>,
    /// Edges lifted onto the folder boundary, not counting intra-folder drops.
    pub lifted_edge_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FolderCollapse {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub folders: Vec<FolderCollapseMeta>,
}

/// Collapse the given folders. When a folder and one of its sub-folders
/// are both collapsed, the outermost one wins.
pub fn collapse_folders(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    collapsed: &HashSet<NodeId>,
) -> FolderCollapse {
    let present: HashSet<NodeId> = nodes
        .iter()
        .filter(|n| collapsed.contains(&n.id))
        .map(|n| n.id.clone())
        .collect();
    if present.is_empty() {
        return FolderCollapse {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
            folders: Vec::new(),
        };
    }

    let parents = ParentMap::from_nodes(nodes);
    // node -> outermost collapsed ancestor, for hidden nodes only
    let owner: HashMap<&str, &NodeId> = nodes
        .iter()
        .filter_map(|n| parents.outermost_in(&n.id, &present).map(|o| (n.id.as_str(), o)))
        .collect();

    let mut children: HashMap<&str, Vec<NodeId>> = HashMap::new();
    for node in nodes {
        if let Some(folder) = owner.get(node.id.as_str()) {
            children.entry(folder.as_str()).or_default().push(node.id.clone());
        }
    }

    let mut out_nodes = Vec::with_capacity(nodes.len() - owner.len());
    for node in nodes.iter().filter(|n| !owner.contains_key(n.id.as_str())) {
        let mut node = node.clone();
        if present.contains(&node.id) {
            node.data.is_collapsed = true;
            node.data.child_count = Some(children.get(node.id.as_str()).map_or(0, Vec::len));
        }
        out_nodes.push(node);
    }

    let remap = |id: &NodeId| -> Option<NodeId> { owner.get(id.as_str()).map(|o| (*o).clone()) };

    let mut lifted: HashMap<NodeId, usize> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out_edges = Vec::with_capacity(edges.len());
    for edge in edges {
        let new_source = remap(&edge.source);
        let new_target = remap(&edge.target);
        if new_source.is_none() && new_target.is_none() {
            if seen.insert(edge.key()) {
                out_edges.push(edge.clone());
            }
            continue;
        }

        let source = new_source.clone().unwrap_or_else(|| edge.source.clone());
        let target = new_target.clone().unwrap_or_else(|| edge.target.clone());
        if source == target {
            continue;
        }
        if matches!(
            edge.data.highway_segment,
            Some(HighwaySegment::Entry | HighwaySegment::Exit)
        ) {
            continue;
        }

        for folder in [&new_source, &new_target].into_iter().flatten() {
            *lifted.entry(folder.clone()).or_default() += 1;
        }

        let key = edge_key(&source, &target, edge.kind);
        if !seen.insert(key.clone()) {
            continue;
        }
        let mut lifted_edge = edge.clone();
        lifted_edge.id = key;
        if new_source.is_some() {
            lifted_edge.data.source_handle = None;
        }
        if new_target.is_some() {
            lifted_edge.data.target_handle = None;
        }
        lifted_edge.source = source;
        lifted_edge.target = target;
        out_edges.push(lifted_edge);
    }

    let folders = out_nodes
        .iter()
        .filter(|n| n.data.is_collapsed && present.contains(&n.id))
        .map(|n| FolderCollapseMeta {
            folder_id: n.id.clone(),
            child_ids: children.get(n.id.as_str()).cloned().unwrap_or_default(),
            lifted_edge_count: lifted.get(&n.id).copied().unwrap_or(0),
        })
        .collect();

    let out_edges = retain_live_edges(&out_nodes, out_edges);
    FolderCollapse {
        nodes: out_nodes,
        edges: out_edges,
        folders,
    }
}
