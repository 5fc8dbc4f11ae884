//! Geometry change detection for committed layouts

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use trellis_core::{GraphNode, NodeId};

/// Position and size changes below this are ignored.
pub const GEOMETRY_TOLERANCE: f64 = 0.5;

/// Nodes whose geometry changed between two commits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeometryChanges {
    /// Monotonically increasing commit sequence number.
    pub sequence: u64,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    /// Moved, resized or reparented beyond tolerance.
    pub changed: Vec<NodeId>,
}

impl GeometryChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

fn geometry_changed(old: &GraphNode, new: &GraphNode) -> bool {
    if old.parent_id != new.parent_id {
        return true;
    }
    if old.position.max_delta(new.position) > GEOMETRY_TOLERANCE {
        return true;
    }
    match (old.size, new.size) {
        (Some(a), Some(b)) => a.max_delta(b) > GEOMETRY_TOLERANCE,
        (None, None) => false,
        _ => true,
    }
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    sequence: u64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pass over both snapshots, in new-snapshot order.
    pub fn detect(&mut self, old: &[GraphNode], new: &[GraphNode]) -> GeometryChanges {
        let before: HashMap<&str, &GraphNode> = old.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut changes = GeometryChanges::default();
        for node in new {
            match before.get(node.id.as_str()) {
                None => changes.added.push(node.id.clone()),
                Some(previous) if geometry_changed(previous, node) => changes.changed.push(node.id.clone()),
                Some(_) => {}
            }
        }
        let after: HashSet<&str> = new.iter().map(|n| n.id.as_str()).collect();
        changes.removed = old
            .iter()
            .filter(|n| !after.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        self.sequence += 1;
        changes.sequence = self.sequence;
        changes
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{NodeKind, Point, Size};

    fn node(id: &str, x: f64) -> GraphNode {
        let mut node = GraphNode::new(id, NodeKind::Module, id);
        node.position = Point::new(x, 0.0);
        node.size = Some(Size::new(10.0, 10.0));
        node
    }

    #[test]
    fn small_moves_are_ignored() {
        let mut tracker = ChangeTracker::new();
        let changes = tracker.detect(&[node("a", 0.0)], &[node("a", 0.4)]);
        assert!(changes.is_empty());
        assert_eq!(changes.sequence, 1);
    }

    #[test]
    fn reports_moves_additions_and_removals() {
        let mut tracker = ChangeTracker::new();
        let old = vec![node("a", 0.0), node("b", 0.0)];
        let mut moved = node("a", 3.0);
        moved.parent_id = None;
        let mut reparented = node("c", 0.0);
        reparented.parent_id = Some("a".into());
        let changes = tracker.detect(&old, &[moved, reparented]);
        assert_eq!(changes.changed, vec!["a"]);
        assert_eq!(changes.added, vec!["c"]);
        assert_eq!(changes.removed, vec!["b"]);
        assert_eq!(changes.len(), 3);

        let again = tracker.detect(&[], &[]);
        assert_eq!(again.sequence, 2);
    }

    #[test]
    fn parent_change_counts_even_without_movement() {
        let mut tracker = ChangeTracker::new();
        let mut child = node("a", 0.0);
        child.parent_id = Some("p".into());
        let changes = tracker.detect(&[node("a", 0.0)], &[child]);
        assert_eq!(changes.changed, vec!["a"]);
    }
}
