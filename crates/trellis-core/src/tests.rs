//! Cross-module tests for trellis-core

use std::collections::HashSet;

use proptest::prelude::*;

use crate::test_utils::{cycle_graph, sample_graph};
use crate::*;

fn module_nodes(count: usize) -> Vec<GraphNode> {
    (0..count)
        .map(|i| GraphNode::new(format!("m{i}"), NodeKind::Module, format!("m{i}")))
        .collect()
}

fn edge_kind_strategy() -> impl Strategy<Value = Option<EdgeKind>> {
    prop_oneof![
        Just(None),
        Just(Some(EdgeKind::Import)),
        Just(Some(EdgeKind::Export)),
        Just(Some(EdgeKind::Dependency)),
        Just(Some(EdgeKind::Uses)),
        Just(Some(EdgeKind::Inheritance)),
    ]
}

/// Edges between `m0..m{nodes}` as index pairs.
fn module_edges_strategy(nodes: usize, max_edges: usize) -> impl Strategy<Value = Vec<GraphEdge>> {
    prop::collection::vec((0..nodes, 0..nodes, edge_kind_strategy()), 0..=max_edges).prop_map(|pairs| {
        let mut seen = HashSet::new();
        pairs
            .into_iter()
            .map(|(s, t, kind)| GraphEdge::new(format!("m{s}"), format!("m{t}"), kind))
            .filter(|e| seen.insert(e.id.clone()))
            .collect()
    })
}

/// Folder forest `f0..f7` plus modules `m0..m11`, each parented to an
/// earlier folder or nothing.
fn folder_tree_strategy() -> impl Strategy<Value = (Vec<GraphNode>, HashSet<NodeId>)> {
    (
        prop::collection::vec(prop::option::of(0usize..8), 8),
        prop::collection::vec(prop::option::of(0usize..8), 12),
        prop::collection::vec(any::<bool>(), 8),
    )
        .prop_map(|(folder_parents, module_parents, collapsed)| {
            let mut nodes = Vec::new();
            for (i, parent) in folder_parents.iter().enumerate() {
                let mut folder = GraphNode::new(format!("f{i}"), NodeKind::Group, format!("f{i}"));
                folder.parent_id = parent.filter(|p| *p < i).map(|p| format!("f{p}"));
                nodes.push(folder);
            }
            for (i, parent) in module_parents.iter().enumerate() {
                let mut module = GraphNode::new(format!("m{i}"), NodeKind::Module, format!("m{i}"));
                module.parent_id = parent.map(|p| format!("f{p}"));
                nodes.push(module);
            }
            let collapsed = collapsed
                .iter()
                .enumerate()
                .filter(|(_, on)| **on)
                .map(|(i, _)| format!("f{i}"))
                .collect();
            (nodes, collapsed)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_cycle_groups_are_never_singletons(edges in module_edges_strategy(10, 30)) {
        let nodes = module_nodes(10);
        let result = collapse_cycles(&nodes, &edges);
        for group in &result.groups {
            prop_assert!(group.member_ids.len() >= 2);
            let mut sorted = group.member_ids.clone();
            sorted.sort();
            prop_assert_eq!(&group.id, &format!("scc:{}", sorted.join(",")));
            prop_assert_eq!(&group.label, &format!("Cycle({})", sorted.len()));
        }
        let live: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &result.edges {
            prop_assert!(live.contains(edge.source.as_str()) && live.contains(edge.target.as_str()));
        }
    }

    #[test]
    fn prop_collapsed_children_never_surface(
        (nodes, collapsed) in folder_tree_strategy(),
        edges in module_edges_strategy(12, 30),
    ) {
        let result = collapse_folders(&nodes, &edges, &collapsed);
        let visible: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        for meta in &result.folders {
            prop_assert!(!meta.child_ids.contains(&meta.folder_id));
            for child in &meta.child_ids {
                prop_assert!(!visible.contains(child.as_str()));
            }
            let folder = result.nodes.iter().find(|n| n.id == meta.folder_id).unwrap();
            prop_assert_eq!(folder.data.child_count, Some(meta.child_ids.len()));
        }
        let mut keys = HashSet::new();
        for edge in &result.edges {
            prop_assert!(visible.contains(edge.source.as_str()) && visible.contains(edge.target.as_str()));
            prop_assert!(keys.insert(edge.key()));
        }
    }

    #[test]
    fn prop_bundling_is_idempotent(edges in module_edges_strategy(8, 80)) {
        let once = bundle_parallel_edges(&edges).into_owned();
        let twice = bundle_parallel_edges(&once).into_owned();
        prop_assert_eq!(&once, &twice);
        if edges.len() >= CONSOLIDATION_THRESHOLD {
            let pairs: HashSet<(&str, &str)> =
                once.iter().map(|e| (e.source.as_str(), e.target.as_str())).collect();
            prop_assert_eq!(pairs.len(), once.len());
        }
    }
}

#[test]
fn three_module_cycle_collapses_to_one_group() {
    let view = GraphViewBuilder::new(BuildOptions {
        mode: ViewMode::CycleGroups,
        ..BuildOptions::default()
    })
    .build(&cycle_graph());

    assert_eq!(view.cycles.len(), 1);
    let group = &view.cycles[0];
    assert_eq!(group.member_ids, vec!["A", "B", "C"]);
    assert_eq!(group.label, "Cycle(3)");
    assert_eq!(group.id, "scc:A,B,C");
    assert!(view.edges.is_empty());

    let node = view.nodes.iter().find(|n| n.id == group.id).unwrap();
    assert_eq!(node.parent_id.as_deref(), Some("p"));
    for member in ["A", "B", "C"] {
        let member = view.nodes.iter().find(|n| n.id == member).unwrap();
        assert_eq!(member.parent_id.as_deref(), Some("scc:A,B,C"));
        assert!(member.extent_parent);
    }
}

#[test]
fn built_view_has_unique_live_edges() {
    for mode in [ViewMode::Flat, ViewMode::FolderClusters, ViewMode::CycleGroups] {
        let view = GraphViewBuilder::new(BuildOptions {
            mode,
            ..BuildOptions::default()
        })
        .build(&sample_graph());
        let live: HashSet<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut keys = HashSet::new();
        for edge in &view.edges {
            assert!(live.contains(edge.source.as_str()), "{mode:?}: {}", edge.id);
            assert!(live.contains(edge.target.as_str()), "{mode:?}: {}", edge.id);
            assert!(keys.insert(edge.key()), "{mode:?}: duplicate {}", edge.id);
            assert_eq!(edge.id, edge.key());
        }
        assert!(view.nodes.iter().all(|n| n.data.diagnostics.is_some()));
    }
}

#[test]
fn folder_and_cycle_groups_never_mix() {
    let view = GraphViewBuilder::new(BuildOptions {
        mode: ViewMode::CycleGroups,
        ..BuildOptions::default()
    })
    .build(&sample_graph());
    assert!(view
        .nodes
        .iter()
        .all(|n| n.group_kind() != Some(GroupKind::Folder)));

    let view = GraphViewBuilder::default().build(&cycle_graph());
    assert!(view.cycles.is_empty());
    assert!(view.nodes.iter().all(|n| n.group_kind() != Some(GroupKind::Cycle)));
}

#[test]
fn store_receives_builder_output() {
    let view = GraphViewBuilder::default().build(&sample_graph());
    let mut store = GraphStore::new();
    let nodes = store.replace_nodes(view.nodes.clone(), ChangeOrigin::Builder);
    let edges = store.replace_edges(view.edges.clone(), ChangeOrigin::Builder);
    assert!(nodes.is_structural() && edges.is_structural());
    assert!(edges.revision > nodes.revision);
    assert_eq!(store.nodes().len(), view.nodes.len());
}
