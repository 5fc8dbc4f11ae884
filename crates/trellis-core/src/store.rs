//! Owned graph state with a narrow mutation API
//!
//! The store is the single owner of the current renderable snapshot. Every
//! mutation is tagged with its origin and returns a [`StoreChange`] so that
//! consumers can decide whether to react, and in particular so that a
//! component can ignore the echo of its own writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{EdgeId, GraphEdge, GraphNode, NodeId};

/// Shared handle used across async tasks.
pub type SharedStore = Arc<RwLock<GraphStore>>;

/// Who performed a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    Builder,
    Layout,
    Virtualizer,
    User,
}

/// What a mutation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeScope {
    /// Node array replaced.
    Nodes,
    /// Edge array replaced.
    Edges,
    NodePatch(Vec<NodeId>),
    EdgePatch(Vec<EdgeId>),
    /// Pinned edge set changed for these ids.
    Pins(Vec<EdgeId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub revision: u64,
    pub origin: ChangeOrigin,
    pub scope: ChangeScope,
}

impl StoreChange {
    pub fn is_structural(&self) -> bool {
        matches!(self.scope, ChangeScope::Nodes | ChangeScope::Edges)
    }
}

/// Field-level edge update applied by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgePatch {
    pub hidden: bool,
}

#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Edges the user explicitly forced visible.
    pinned: HashSet<EdgeId>,
    revision: u64,
    node_revision: u64,
    edge_revision: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision of the last change that touched nodes.
    pub fn node_revision(&self) -> u64 {
        self.node_revision
    }

    /// Revision of the last change that touched edges.
    pub fn edge_revision(&self) -> u64 {
        self.edge_revision
    }

    pub fn pinned_edges(&self) -> &HashSet<EdgeId> {
        &self.pinned
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned.contains(id)
    }

    pub fn replace_nodes(&mut self, nodes: Vec<GraphNode>, origin: ChangeOrigin) -> StoreChange {
        self.nodes = nodes;
        let change = self.bump(origin, ChangeScope::Nodes);
        self.node_revision = change.revision;
        change
    }

    pub fn replace_edges(&mut self, edges: Vec<GraphEdge>, origin: ChangeOrigin) -> StoreChange {
        self.edges = edges;
        let live: HashSet<&str> = self.edges.iter().map(|e| e.id.as_str()).collect();
        self.pinned.retain(|id| live.contains(id.as_str()));
        let change = self.bump(origin, ChangeScope::Edges);
        self.edge_revision = change.revision;
        change
    }

    /// Apply `patch` to every node whose id is in `ids`. Unknown ids are
    /// ignored; returns `None` when nothing matched.
    pub fn patch_nodes_by_ids<F>(
        &mut self,
        ids: &HashSet<NodeId>,
        origin: ChangeOrigin,
        mut patch: F,
    ) -> Option<StoreChange>
    where
        F: FnMut(&mut GraphNode),
    {
        let mut touched = Vec::new();
        for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            patch(node);
            touched.push(node.id.clone());
        }
        if touched.is_empty() {
            return None;
        }
        let change = self.bump(origin, ChangeScope::NodePatch(touched));
        self.node_revision = change.revision;
        Some(change)
    }

    /// Apply per-edge patches. Entries whose value already matches are
    /// skipped; returns `None` when nothing changed.
    pub fn patch_edges_by_ids(
        &mut self,
        patches: &HashMap<EdgeId, EdgePatch>,
        origin: ChangeOrigin,
    ) -> Option<StoreChange> {
        let mut touched = Vec::new();
        for edge in &mut self.edges {
            if let Some(patch) = patches.get(&edge.id) {
                if edge.hidden != patch.hidden {
                    edge.hidden = patch.hidden;
                    touched.push(edge.id.clone());
                }
            }
        }
        if touched.is_empty() {
            return None;
        }
        let change = self.bump(origin, ChangeScope::EdgePatch(touched));
        self.edge_revision = change.revision;
        Some(change)
    }

    /// Force edges visible. Pinning also clears their hidden flag.
    pub fn pin_edges(&mut self, ids: &[EdgeId]) -> Option<StoreChange> {
        let known: HashSet<&str> = self.edges.iter().map(|e| e.id.as_str()).collect();
        let added: Vec<EdgeId> = ids
            .iter()
            .filter(|id| known.contains(id.as_str()))
            .filter(|id| self.pinned.insert((*id).clone()))
            .cloned()
            .collect();
        if added.is_empty() {
            return None;
        }
        for edge in self.edges.iter_mut().filter(|e| added.contains(&e.id)) {
            edge.hidden = false;
        }
        let change = self.bump(ChangeOrigin::User, ChangeScope::Pins(added));
        self.edge_revision = change.revision;
        Some(change)
    }

    pub fn unpin_edges(&mut self, ids: &[EdgeId]) -> Option<StoreChange> {
        let removed: Vec<EdgeId> = ids.iter().filter(|id| self.pinned.remove(*id)).cloned().collect();
        if removed.is_empty() {
            return None;
        }
        let change = self.bump(ChangeOrigin::User, ChangeScope::Pins(removed));
        self.edge_revision = change.revision;
        Some(change)
    }

    fn bump(&mut self, origin: ChangeOrigin, scope: ChangeScope) -> StoreChange {
        self.revision += 1;
        tracing::trace!(revision = self.revision, ?origin, "graph store changed");
        StoreChange {
            revision: self.revision,
            origin,
            scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, NodeKind};

    fn store_with_edges() -> GraphStore {
        let mut store = GraphStore::new();
        store.replace_nodes(
            vec![
                GraphNode::new("a", NodeKind::Module, "a"),
                GraphNode::new("b", NodeKind::Module, "b"),
            ],
            ChangeOrigin::Builder,
        );
        store.replace_edges(
            vec![GraphEdge::new("a", "b", Some(EdgeKind::Import))],
            ChangeOrigin::Builder,
        );
        store
    }

    #[test]
    fn revisions_increase_per_mutation() {
        let mut store = store_with_edges();
        assert_eq!(store.revision(), 2);
        assert_eq!(store.node_revision(), 1);
        assert_eq!(store.edge_revision(), 2);

        let patches = HashMap::from([("a|b|import".to_string(), EdgePatch { hidden: true })]);
        let change = store
            .patch_edges_by_ids(&patches, ChangeOrigin::Virtualizer)
            .unwrap();
        assert_eq!(change.revision, 3);
        assert_eq!(change.origin, ChangeOrigin::Virtualizer);
        assert!(store.edges()[0].hidden);
    }

    #[test]
    fn redundant_patch_is_not_a_change() {
        let mut store = store_with_edges();
        let patches = HashMap::from([("a|b|import".to_string(), EdgePatch { hidden: false })]);
        assert!(store.patch_edges_by_ids(&patches, ChangeOrigin::User).is_none());
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn pins_drop_with_replaced_edges() {
        let mut store = store_with_edges();
        store.pin_edges(&["a|b|import".to_string()]).unwrap();
        assert!(store.is_pinned("a|b|import"));
        store.replace_edges(Vec::new(), ChangeOrigin::Builder);
        assert!(store.pinned_edges().is_empty());
    }

    #[test]
    fn node_patch_touches_only_matching_ids() {
        let mut store = store_with_edges();
        let ids = HashSet::from(["b".to_string(), "missing".to_string()]);
        let change = store
            .patch_nodes_by_ids(&ids, ChangeOrigin::User, |n| n.data.label = "B".into())
            .unwrap();
        assert_eq!(change.scope, ChangeScope::NodePatch(vec!["b".to_string()]));
        assert_eq!(store.nodes()[1].data.label, "B");
        assert_eq!(store.nodes()[0].data.label, "a");
    }
}
