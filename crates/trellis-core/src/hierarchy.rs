//! Containment helpers over `parent_id` chains

use std::collections::{HashMap, HashSet};

use crate::geometry::{Rect, Size};
use crate::model::{GraphEdge, GraphNode, NodeId};

/// Immutable `child -> parent` map built once per transform.
#[derive(Debug, Default, Clone)]
pub struct ParentMap {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentMap {
    pub fn from_nodes(nodes: &[GraphNode]) -> Self {
        let parents = nodes
            .iter()
            .filter_map(|n| n.parent_id.as_ref().map(|p| (n.id.clone(), p.clone())))
            .collect();
        ParentMap { parents }
    }

    pub fn parent(&self, id: &str) -> Option<&NodeId> {
        self.parents.get(id)
    }

    /// Ancestors from nearest to outermost. The walk is bounded by the map
    /// size so a malformed cyclic chain cannot loop forever.
    pub fn ancestors<'a>(&'a self, id: &str) -> Vec<&'a NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parents.get(id);
        let mut steps = 0;
        while let Some(parent) = current {
            if steps > self.parents.len() || parent == id {
                break;
            }
            chain.push(parent);
            current = self.parents.get(parent.as_str());
            steps += 1;
        }
        chain
    }

    /// Outermost ancestor contained in `set`, if any.
    pub fn outermost_in<'a>(&'a self, id: &str, set: &HashSet<NodeId>) -> Option<&'a NodeId> {
        self.ancestors(id).into_iter().filter(|a| set.contains(a.as_str())).last()
    }

    pub fn is_descendant_of(&self, id: &str, ancestor: &str) -> bool {
        self.ancestors(id).iter().any(|a| a.as_str() == ancestor)
    }
}

/// Drop edges whose endpoints are not both present in `nodes`.
pub fn retain_live_edges(nodes: &[GraphNode], edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let live: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let before = edges.len();
    let kept: Vec<GraphEdge> = edges
        .into_iter()
        .filter(|e| live.contains(e.source.as_str()) && live.contains(e.target.as_str()))
        .collect();
    if kept.len() != before {
        tracing::debug!(dropped = before - kept.len(), "dropped edges with missing endpoints");
    }
    kept
}

/// Clear `parent_id` references to nodes that are not present.
pub fn detach_orphans(nodes: &mut [GraphNode]) {
    let live: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    for node in nodes.iter_mut() {
        if node.parent_id.as_ref().is_some_and(|p| !live.contains(p)) {
            node.parent_id = None;
            node.extent_parent = false;
        }
    }
}

/// Absolute rectangles for every node, resolving parent-relative
/// positions. Nodes without a size use `fallback`.
pub fn absolute_rects(nodes: &[GraphNode], fallback: Size) -> HashMap<NodeId, Rect> {
    let parents = ParentMap::from_nodes(nodes);
    let by_id: HashMap<&str, &GraphNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    nodes
        .iter()
        .map(|node| {
            let mut origin = node.position;
            for ancestor in parents.ancestors(&node.id) {
                match by_id.get(ancestor.as_str()) {
                    Some(parent) => origin = origin.offset(parent.position),
                    None => break,
                }
            }
            (node.id.clone(), Rect::new(origin, node.size.unwrap_or(fallback)))
        })
        .collect()
}
