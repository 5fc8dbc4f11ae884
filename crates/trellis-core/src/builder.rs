//! Turn a raw package graph into a render-ready view snapshot
//!
//! The build is a fixed pipeline:
//!
//! 1. materialise nodes and edges, keeping enabled node kinds
//! 2. drop test files when they are switched off
//! 3. snapshot the result as the semantic graph
//! 4. apply exactly one grouping transform (cycles or folders)
//! 5. collapse the requested folders
//! 6. hide edges whose relationship kind is switched off
//! 7. bundle parallel edges
//! 8. annotate nodes with degree and test diagnostics
//!
//! Building never fails. Relations that point at missing entities are
//! left out of the output.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::clustering::cluster_by_folder;
use crate::collapse::{collapse_folders, FolderCollapseMeta};
use crate::consolidate::{bundle_parallel_edges, route_highways, HighwayOptions};
use crate::cycles::{collapse_cycles, SccGroup};
use crate::diagnostics::{annotate, degree_counts, roll_up_groups, DiagnosticInputs};
use crate::error::Result;
use crate::hierarchy::{detach_orphans, retain_live_edges};
use crate::model::{EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind, RawGraph};
use crate::preferences::{ViewMode, ViewPreferences};
use crate::search::SemanticGraph;
use crate::testfiles::TestFileMatcher;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: ViewMode,
    pub node_kinds: HashSet<NodeKind>,
    pub edge_kinds: HashSet<EdgeKind>,
    pub show_test_files: bool,
    pub collapsed_folders: HashSet<NodeId>,
    /// Highway routing, folder mode only.
    pub highways: Option<HighwayOptions>,
    pub test_files: TestFileMatcher,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            mode: ViewMode::FolderClusters,
            node_kinds: NodeKind::ALL.into_iter().collect(),
            edge_kinds: EdgeKind::ALL.into_iter().collect(),
            show_test_files: true,
            collapsed_folders: HashSet::new(),
            highways: None,
            test_files: TestFileMatcher::default(),
        }
    }
}

impl BuildOptions {
    pub fn from_preferences(view: &ViewPreferences) -> Result<Self> {
        let highways = view.highway_routing.then_some(HighwayOptions {
            min_group_size: view.highway_min_group.max(2),
        });
        Ok(BuildOptions {
            mode: view.mode(),
            node_kinds: view.node_kinds.iter().copied().collect(),
            edge_kinds: view.edge_kinds.iter().copied().collect(),
            show_test_files: view.show_test_files,
            collapsed_folders: view.collapsed_folders.iter().cloned().collect(),
            highways,
            test_files: TestFileMatcher::new(&view.test_patterns)?,
        })
    }

    /// Untyped, `uses` and `contains` edges are always shown. Bundled
    /// edges are shown when any of their kinds is.
    pub fn relationship_visible(&self, edge: &GraphEdge) -> bool {
        if edge.kind.is_none() {
            return true;
        }
        edge.all_kinds()
            .into_iter()
            .any(|k| k.always_visible() || self.edge_kinds.contains(&k))
    }
}

/// Output of one build.
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Filtered graph before grouping, for search and traversal.
    pub semantic: SemanticGraph,
    pub cycles: Vec<SccGroup>,
    pub folders: Vec<FolderCollapseMeta>,
}

/// Unfiltered nodes and edges plus per-entity facts gathered on the way.
#[derive(Debug, Default)]
struct Materialized {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    test_files: HashSet<NodeId>,
    external_dependencies: HashMap<NodeId, Vec<String>>,
}

impl Materialized {
    fn push_node(&mut self, seen: &mut HashSet<NodeId>, node: GraphNode) -> bool {
        if !seen.insert(node.id.clone()) {
            tracing::debug!(id = %node.id, "skipping duplicate node id");
            return false;
        }
        self.nodes.push(node);
        true
    }

    fn push_edge(&mut self, seen: &mut HashSet<String>, source: &str, target: &str, kind: Option<EdgeKind>) {
        let edge = GraphEdge::new(source, target, kind);
        if seen.insert(edge.id.clone()) {
            self.edges.push(edge);
        }
    }
}

fn sorted_unique(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

fn materialize(raw: &RawGraph, matcher: &TestFileMatcher) -> Materialized {
    let mut out = Materialized::default();
    let mut node_ids: HashSet<NodeId> = HashSet::new();
    let mut edge_ids: HashSet<String> = HashSet::new();
    let package_ids: HashSet<&str> = raw.packages.iter().map(|p| p.id.as_str()).collect();

    for package in &raw.packages {
        let mut node = GraphNode::new(package.id.clone(), NodeKind::Package, package.name.clone());
        node.data.path = package.path.clone();
        if !out.push_node(&mut node_ids, node) {
            continue;
        }
        let mut package_external = Vec::new();
        for dependency in &package.dependencies {
            if package_ids.contains(dependency.target.as_str()) {
                out.push_edge(&mut edge_ids, &package.id, &dependency.target, Some(dependency.kind));
            } else {
                package_external.push(dependency.target.clone());
            }
        }

        for module in &package.modules {
            let node = GraphNode::new(module.id.clone(), NodeKind::Module, module.name.clone())
                .with_parent(package.id.clone())
                .with_path(module.path.clone());
            if !out.push_node(&mut node_ids, node) {
                continue;
            }
            let is_test = matcher.is_test_path(&module.path);
            if is_test {
                out.test_files.insert(module.id.clone());
            }

            let mut module_external = Vec::new();
            for import in &module.imports {
                match &import.resolved {
                    Some(target) => out.push_edge(&mut edge_ids, &module.id, target, Some(EdgeKind::Import)),
                    None => module_external.push(import.specifier.clone()),
                }
            }
            if !module_external.is_empty() {
                package_external.extend(module_external.iter().cloned());
                out.external_dependencies
                    .insert(module.id.clone(), sorted_unique(module_external));
            }

            for class in &module.classes {
                let node = GraphNode::new(class.id.clone(), NodeKind::Class, class.name.clone())
                    .with_parent(module.id.clone());
                if !out.push_node(&mut node_ids, node) {
                    continue;
                }
                if let Some(base) = &class.extends {
                    out.push_edge(&mut edge_ids, &class.id, base, Some(EdgeKind::Inheritance));
                }
                for interface in &class.implements {
                    out.push_edge(&mut edge_ids, &class.id, interface, Some(EdgeKind::Implements));
                }
                let members = class
                    .properties
                    .iter()
                    .map(|m| (m, NodeKind::Property))
                    .chain(class.methods.iter().map(|m| (m, NodeKind::Method)));
                for (member, kind) in members {
                    let node = GraphNode::new(member.id.clone(), kind, member.name.clone())
                        .with_parent(class.id.clone());
                    if out.push_node(&mut node_ids, node) && is_test {
                        out.test_files.insert(member.id.clone());
                    }
                }
                if is_test {
                    out.test_files.insert(class.id.clone());
                }
            }

            for interface in &module.interfaces {
                let node = GraphNode::new(interface.id.clone(), NodeKind::Interface, interface.name.clone())
                    .with_parent(module.id.clone());
                if !out.push_node(&mut node_ids, node) {
                    continue;
                }
                for base in &interface.extends {
                    out.push_edge(&mut edge_ids, &interface.id, base, Some(EdgeKind::Extends));
                }
                let members = interface
                    .properties
                    .iter()
                    .map(|m| (m, NodeKind::Property))
                    .chain(interface.methods.iter().map(|m| (m, NodeKind::Method)));
                for (member, kind) in members {
                    let node = GraphNode::new(member.id.clone(), kind, member.name.clone())
                        .with_parent(interface.id.clone());
                    if out.push_node(&mut node_ids, node) && is_test {
                        out.test_files.insert(member.id.clone());
                    }
                }
                if is_test {
                    out.test_files.insert(interface.id.clone());
                }
            }
        }

        if !package_external.is_empty() {
            out.external_dependencies
                .insert(package.id.clone(), sorted_unique(package_external));
        }
    }

    for relationship in &raw.relationships {
        out.push_edge(&mut edge_ids, &relationship.source, &relationship.target, relationship.kind);
    }

    out.edges = retain_live_edges(&out.nodes, std::mem::take(&mut out.edges));
    out
}

#[derive(Debug, Clone, Default)]
pub struct GraphViewBuilder {
    options: BuildOptions,
}

impl GraphViewBuilder {
    pub fn new(options: BuildOptions) -> Self {
        GraphViewBuilder { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    #[instrument(skip_all, fields(packages = raw.packages.len(), mode = ?self.options.mode))]
    pub fn build(&self, raw: &RawGraph) -> ViewSnapshot {
        let options = &self.options;
        let full = materialize(raw, &options.test_files);

        let mut nodes: Vec<GraphNode> = full
            .nodes
            .iter()
            .filter(|n| options.node_kinds.contains(&n.kind))
            .filter(|n| options.show_test_files || !full.test_files.contains(&n.id))
            .cloned()
            .collect();
        detach_orphans(&mut nodes);
        let edges = retain_live_edges(&nodes, full.edges.clone());

        let semantic = SemanticGraph::new(nodes.clone(), edges.clone());

        let (grouped_nodes, grouped_edges, cycles) = match options.mode {
            ViewMode::CycleGroups => {
                let collapsed = collapse_cycles(&nodes, &edges);
                (collapsed.nodes, collapsed.edges, collapsed.groups)
            }
            ViewMode::FolderClusters => {
                let clustered = cluster_by_folder(&nodes);
                let edges = match options.highways {
                    Some(highways) => route_highways(&clustered, &edges, highways).into_owned(),
                    None => edges,
                };
                (clustered, edges, Vec::new())
            }
            ViewMode::Flat => (nodes, edges, Vec::new()),
        };

        let (mut nodes, mut edges, folders) = if options.collapsed_folders.is_empty() {
            (grouped_nodes.clone(), grouped_edges, Vec::new())
        } else {
            let collapsed = collapse_folders(&grouped_nodes, &grouped_edges, &options.collapsed_folders);
            (collapsed.nodes, collapsed.edges, collapsed.folders)
        };

        for edge in edges.iter_mut() {
            edge.hidden = !options.relationship_visible(edge);
        }

        if let std::borrow::Cow::Owned(bundled) = bundle_parallel_edges(&edges) {
            edges = bundled;
        }

        let mut scoped = semantic.edges.clone();
        for edge in scoped.iter_mut() {
            edge.hidden = !options.relationship_visible(edge);
        }
        let mut current_degree = degree_counts(&scoped, false);
        roll_up_groups(&grouped_nodes, &mut current_degree);
        let mut global_degree = degree_counts(&full.edges, true);
        roll_up_groups(&grouped_nodes, &mut global_degree);

        let inputs = DiagnosticInputs {
            current_degree,
            global_degree,
            test_files: full.test_files,
            external_dependencies: full.external_dependencies,
        };
        annotate(&mut nodes, &inputs);

        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            cycles = cycles.len(),
            collapsed = folders.len(),
            "built view"
        );
        ViewSnapshot {
            nodes,
            edges,
            semantic,
            cycles,
            folders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{cycle_graph, sample_graph};

    fn find<'a>(nodes: &'a [GraphNode], id: &str) -> &'a GraphNode {
        nodes.iter().find(|n| n.id == id).unwrap()
    }

    #[test]
    fn materializes_hierarchy_and_relationships() {
        let view = GraphViewBuilder::new(BuildOptions {
            mode: ViewMode::Flat,
            ..BuildOptions::default()
        })
        .build(&sample_graph());

        assert_eq!(find(&view.nodes, "api/router").parent_id.as_deref(), Some("api"));
        assert_eq!(find(&view.nodes, "api/Router").kind, NodeKind::Class);
        assert_eq!(find(&view.nodes, "api/Router.handle").kind, NodeKind::Method);
        assert!(view.edges.iter().any(|e| e.id == "api/Router|core/Service|inheritance"));
        assert!(view.edges.iter().any(|e| e.id == "api|core|dependency"));
        // unresolved target is omitted, not an error
        assert!(!view.edges.iter().any(|e| e.target == "missing"));
    }

    #[test]
    fn disabled_relationship_kinds_are_hidden_not_removed() {
        let mut options = BuildOptions {
            mode: ViewMode::Flat,
            ..BuildOptions::default()
        };
        options.edge_kinds = HashSet::from([EdgeKind::Dependency]);
        let view = GraphViewBuilder::new(options).build(&sample_graph());

        let import = view.edges.iter().find(|e| e.kind == Some(EdgeKind::Import)).unwrap();
        assert!(import.hidden);
        let uses = view.edges.iter().find(|e| e.kind == Some(EdgeKind::Uses)).unwrap();
        assert!(!uses.hidden);
        let dependency = view.edges.iter().find(|e| e.kind == Some(EdgeKind::Dependency)).unwrap();
        assert!(!dependency.hidden);
    }

    #[test]
    fn node_kind_filter_drops_dangling_edges() {
        let mut options = BuildOptions {
            mode: ViewMode::Flat,
            ..BuildOptions::default()
        };
        options.node_kinds = HashSet::from([NodeKind::Package, NodeKind::Module]);
        let view = GraphViewBuilder::new(options).build(&sample_graph());
        assert!(view.nodes.iter().all(|n| matches!(n.kind, NodeKind::Package | NodeKind::Module)));
        let ids: HashSet<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &view.edges {
            assert!(ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str()));
        }
    }

    #[test]
    fn test_files_can_be_filtered_out() {
        let shown = GraphViewBuilder::default().build(&sample_graph());
        let test_module = find(&shown.nodes, "api/router.test");
        assert!(test_module.data.diagnostics.as_ref().unwrap().is_test_file);

        let hidden = GraphViewBuilder::new(BuildOptions {
            show_test_files: false,
            ..BuildOptions::default()
        })
        .build(&sample_graph());
        assert!(!hidden.nodes.iter().any(|n| n.id == "api/router.test"));
        assert!(!hidden.semantic.nodes.iter().any(|n| n.id == "api/router.test"));
    }

    #[test]
    fn cycle_mode_never_creates_folders() {
        let view = GraphViewBuilder::new(BuildOptions {
            mode: ViewMode::CycleGroups,
            ..BuildOptions::default()
        })
        .build(&cycle_graph());
        assert_eq!(view.cycles.len(), 1);
        assert!(view.nodes.iter().all(|n| !n.id.starts_with("folder:")));
        // semantic snapshot is untouched by grouping
        assert_eq!(view.semantic.edges.len(), 3);
    }

    #[test]
    fn folder_mode_clusters_and_collapses() {
        let options = BuildOptions {
            collapsed_folders: HashSet::from(["folder:api:src/http".to_string()]),
            ..BuildOptions::default()
        };
        let view = GraphViewBuilder::new(options).build(&sample_graph());
        let folder = find(&view.nodes, "folder:api:src/http");
        assert!(folder.data.is_collapsed);
        assert!(!view.nodes.iter().any(|n| n.id == "api/router"));
        assert_eq!(view.folders.len(), 1);
        assert!(view.edges.iter().any(|e| e.source == "folder:api:src/http"));
    }

    #[test]
    fn orphan_flags_distinguish_scope() {
        let mut options = BuildOptions {
            mode: ViewMode::Flat,
            ..BuildOptions::default()
        };
        options.edge_kinds = HashSet::new();
        let view = GraphViewBuilder::new(options).build(&sample_graph());
        let router = find(&view.nodes, "api/router").data.diagnostics.clone().unwrap();
        assert!(router.orphan_current);
        assert!(!router.orphan_global);
        let lonely = find(&view.nodes, "core/unused").data.diagnostics.clone().unwrap();
        assert!(lonely.orphan_current && lonely.orphan_global);
    }

    #[test]
    fn external_dependencies_roll_up_to_packages() {
        let view = GraphViewBuilder::default().build(&sample_graph());
        let module = find(&view.nodes, "api/router").data.diagnostics.clone().unwrap();
        assert_eq!(module.external_dependencies, vec!["express"]);
        let package = find(&view.nodes, "api").data.diagnostics.clone().unwrap();
        assert_eq!(package.external_dependencies, vec!["express", "left-pad"]);
        assert_eq!(package.external_dependency_count, 2);
    }

    #[test]
    fn build_is_deterministic() {
        let builder = GraphViewBuilder::default();
        let a = builder.build(&sample_graph());
        let b = builder.build(&sample_graph());
        assert_eq!(a.nodes, b.nodes);
        assert_eq!(a.edges, b.edges);
    }
}
