//! Group modules into synthetic folder nodes mirroring the source tree

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::hierarchy::ParentMap;
use crate::model::{GraphNode, GroupInfo, GroupKind, NodeId, NodeKind};

/// Synthetic id of a folder under an optional package scope.
pub fn folder_id(scope: Option<&str>, dir: &str) -> NodeId {
    format!("folder:{}:{}", scope.unwrap_or(""), dir)
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_matches('/').to_string()
}

/// Directory part of `path` relative to `root`, split into segments.
fn dir_segments(path: &str, root: Option<&str>) -> Vec<String> {
    let path = normalize(path);
    let relative = match root.map(normalize).filter(|r| !r.is_empty()) {
        Some(root) => path
            .strip_prefix(&root)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
            .unwrap_or(path.clone()),
        None => path.clone(),
    };
    let mut segments: Vec<String> = relative
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect();
    segments.pop();
    segments
}

fn clusterable(node: &GraphNode) -> bool {
    matches!(node.kind, NodeKind::Module | NodeKind::Class | NodeKind::Interface)
        && node.data.path.is_some()
        && node.group_kind().is_none()
}

/// Insert folder nodes and point each clusterable node at its deepest
/// folder. Running this on its own output returns the input unchanged.
#[instrument(skip_all, fields(nodes = nodes.len()))]
pub fn cluster_by_folder(nodes: &[GraphNode]) -> Vec<GraphNode> {
    let parents = ParentMap::from_nodes(nodes);
    let by_id: HashMap<&str, &GraphNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut existing: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();

    let mut out = Vec::with_capacity(nodes.len());
    let mut created = 0usize;
    for node in nodes {
        if !clusterable(node) {
            out.push(node.clone());
            continue;
        }

        let package = parents
            .ancestors(&node.id)
            .into_iter()
            .find_map(|a| by_id.get(a.as_str()).filter(|n| n.kind == NodeKind::Package));
        let scope = package.map(|p| p.id.as_str());
        let root = package.and_then(|p| p.data.path.as_deref());
        let segments = dir_segments(node.data.path.as_deref().unwrap_or_default(), root);
        if segments.is_empty() {
            out.push(node.clone());
            continue;
        }

        let mut parent: Option<NodeId> = scope.map(str::to_string);
        let mut dir = String::new();
        for segment in &segments {
            if !dir.is_empty() {
                dir.push('/');
            }
            dir.push_str(segment);
            let id = folder_id(scope, &dir);
            if existing.insert(id.clone()) {
                let mut folder = GraphNode::new(id.clone(), NodeKind::Group, segment.clone()).with_path(dir.clone());
                folder.parent_id = parent.clone();
                folder.data.group = Some(GroupInfo {
                    kind: GroupKind::Folder,
                    member_ids: Vec::new(),
                });
                out.push(folder);
                created += 1;
            }
            parent = Some(id);
        }

        let mut placed = node.clone();
        placed.parent_id = parent;
        out.push(placed);
    }

    if created > 0 {
        tracing::debug!(folders = created, "clustered nodes by folder");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<GraphNode> {
        vec![
            GraphNode::new("pkg", NodeKind::Package, "pkg").with_path("packages/pkg"),
            GraphNode::new("m1", NodeKind::Module, "a.ts")
                .with_parent("pkg")
                .with_path("packages/pkg/src/utils/a.ts"),
            GraphNode::new("m2", NodeKind::Module, "b.ts")
                .with_parent("pkg")
                .with_path("packages/pkg/src/b.ts"),
            GraphNode::new("m3", NodeKind::Module, "index.ts")
                .with_parent("pkg")
                .with_path("packages/pkg/index.ts"),
        ]
    }

    #[test]
    fn builds_folder_chain_relative_to_package() {
        let out = cluster_by_folder(&fixture());
        let ids: Vec<&str> = out.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["pkg", "folder:pkg:src", "folder:pkg:src/utils", "m1", "m2", "m3"]
        );
        let find = |id: &str| out.iter().find(|n| n.id == id).unwrap();
        assert_eq!(find("folder:pkg:src").parent_id.as_deref(), Some("pkg"));
        assert_eq!(find("folder:pkg:src/utils").parent_id.as_deref(), Some("folder:pkg:src"));
        assert_eq!(find("m1").parent_id.as_deref(), Some("folder:pkg:src/utils"));
        assert_eq!(find("m2").parent_id.as_deref(), Some("folder:pkg:src"));
        assert_eq!(find("m3").parent_id.as_deref(), Some("pkg"));
        assert_eq!(find("folder:pkg:src/utils").data.label, "utils");
    }

    #[test]
    fn clustering_is_idempotent() {
        let once = cluster_by_folder(&fixture());
        let twice = cluster_by_folder(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn modules_without_package_use_empty_scope() {
        let nodes = vec![GraphNode::new("m", NodeKind::Module, "m").with_path("./lib/m.rs")];
        let out = cluster_by_folder(&nodes);
        assert_eq!(out[0].id, "folder::lib");
        assert_eq!(out[1].parent_id.as_deref(), Some("folder::lib"));
    }
}
