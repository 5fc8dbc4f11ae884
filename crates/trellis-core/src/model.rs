//! Core data structures for the dependency view

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Size};

/// Stable identifier for a node. Raw ids come from ingestion, synthetic
/// ids are derived (`scc:a,b`, `folder:pkg:src/utils`).
pub type NodeId = String;

/// Edge identifier, always `source|target|kind` after any remapping.
pub type EdgeId = String;

/// Discriminates what kind of code entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Package,
    Module,
    Class,
    Interface,
    Property,
    Method,
    /// Synthetic container (SCC cycle or folder).
    Group,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Package,
        NodeKind::Module,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Property,
        NodeKind::Method,
        NodeKind::Group,
    ];

    /// Kinds whose rendered size depends on their children.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            NodeKind::Package | NodeKind::Module | NodeKind::Class | NodeKind::Interface | NodeKind::Group
        )
    }
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Import,
    Export,
    Inheritance,
    Implements,
    Extends,
    Dependency,
    DevDependency,
    PeerDependency,
    Contains,
    Uses,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 10] = [
        EdgeKind::Import,
        EdgeKind::Export,
        EdgeKind::Inheritance,
        EdgeKind::Implements,
        EdgeKind::Extends,
        EdgeKind::Dependency,
        EdgeKind::DevDependency,
        EdgeKind::PeerDependency,
        EdgeKind::Contains,
        EdgeKind::Uses,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Import => "import",
            EdgeKind::Export => "export",
            EdgeKind::Inheritance => "inheritance",
            EdgeKind::Implements => "implements",
            EdgeKind::Extends => "extends",
            EdgeKind::Dependency => "dependency",
            EdgeKind::DevDependency => "devDependency",
            EdgeKind::PeerDependency => "peerDependency",
            EdgeKind::Contains => "contains",
            EdgeKind::Uses => "uses",
        }
    }

    /// Rank used to pick bundle representatives and to keep the most
    /// important edges when zoomed out. Higher wins.
    pub fn priority(self) -> u8 {
        match self {
            EdgeKind::Contains | EdgeKind::Uses => 5,
            EdgeKind::Inheritance => 4,
            EdgeKind::Implements | EdgeKind::Extends => 3,
            EdgeKind::Dependency => 2,
            EdgeKind::Import => 1,
            EdgeKind::DevDependency | EdgeKind::PeerDependency | EdgeKind::Export => 0,
        }
    }

    /// `uses` and `contains` edges ignore the relationship filter.
    pub fn always_visible(self) -> bool {
        matches!(self, EdgeKind::Uses | EdgeKind::Contains)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a possibly untyped edge; untyped edges rank lowest.
pub fn kind_priority(kind: Option<EdgeKind>) -> u8 {
    kind.map_or(0, EdgeKind::priority)
}

/// Canonical dedup key and id for an edge.
pub fn edge_key(source: &str, target: &str, kind: Option<EdgeKind>) -> EdgeId {
    format!("{}|{}|{}", source, target, kind.map_or("", EdgeKind::as_str))
}

/// Which synthetic grouping produced a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupKind {
    Cycle,
    Folder,
}

/// Extra payload carried by synthetic group nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub kind: GroupKind,
    /// Direct members; for folders this is filled in lazily by consumers.
    #[serde(default)]
    pub member_ids: Vec<NodeId>,
}

/// Annotations computed by the view builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDiagnostics {
    pub is_test_file: bool,
    /// No visible relationships in the current filtered scope.
    pub orphan_current: bool,
    /// No relationships at all in the unfiltered graph.
    pub orphan_global: bool,
    pub external_dependency_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    /// Source path for packages and modules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<NodeDiagnostics>,
    #[serde(default)]
    pub is_collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<usize>,
}

/// A single node in a renderable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Containment parent. Never cyclic; builders guarantee it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub data: NodeData,
    /// Relative to the parent when `parent_id` is set.
    #[serde(default)]
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Constrains the node to its parent's bounds.
    #[serde(default)]
    pub extent_parent: bool,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, label: impl Into<String>) -> Self {
        GraphNode {
            id: id.into(),
            kind,
            parent_id: None,
            data: NodeData {
                label: label.into(),
                ..NodeData::default()
            },
            position: Point::default(),
            size: None,
            extent_parent: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.data.path = Some(path.into());
        self
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        self.data.group.as_ref().map(|g| g.kind)
    }
}

/// Role an edge plays in a consolidated highway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HighwaySegment {
    /// Member node to the boundary of its folder.
    Entry,
    /// Boundary to boundary trunk.
    Highway,
    /// Boundary of the target folder to the member node.
    Exit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    /// Original kinds folded into this edge by bundling or highway routing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bundled_kinds: Vec<EdgeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highway_segment: Option<HighwaySegment>,
    /// Connection-point hints for the rendering surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// A directed edge in a renderable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EdgeKind>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub data: EdgeData,
}

impl GraphEdge {
    /// Build an edge whose id is its dedup key.
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, kind: Option<EdgeKind>) -> Self {
        let source = source.into();
        let target = target.into();
        GraphEdge {
            id: edge_key(&source, &target, kind),
            source,
            target,
            kind,
            hidden: false,
            data: EdgeData::default(),
        }
    }

    pub fn key(&self) -> EdgeId {
        edge_key(&self.source, &self.target, self.kind)
    }

    pub fn is_trunk(&self) -> bool {
        self.data.highway_segment == Some(HighwaySegment::Highway)
    }

    /// Every kind this edge stands for, including bundled members.
    pub fn all_kinds(&self) -> BTreeSet<EdgeKind> {
        let mut kinds: BTreeSet<EdgeKind> = self.data.bundled_kinds.iter().copied().collect();
        if let Some(kind) = self.kind {
            kinds.insert(kind);
        }
        kinds
    }
}

// ── Raw ingestion model ─────────────────────────────────────

/// Hierarchical source data produced by the ingestion stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGraph {
    #[serde(default)]
    pub packages: Vec<RawPackage>,
    /// Named relationships between any two entities.
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPackage {
    pub id: String,
    pub name: String,
    /// Package root; module paths are clustered relative to it.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub modules: Vec<RawModule>,
    #[serde(default)]
    pub dependencies: Vec<RawPackageDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPackageDependency {
    /// Id of another package in the graph, or an external package name.
    pub target: String,
    #[serde(default = "default_dependency_kind")]
    pub kind: EdgeKind,
}

fn default_dependency_kind() -> EdgeKind {
    EdgeKind::Dependency
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawModule {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub classes: Vec<RawClass>,
    #[serde(default)]
    pub interfaces: Vec<RawInterface>,
    #[serde(default)]
    pub imports: Vec<RawImport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImport {
    /// Import specifier as written in source.
    pub specifier: String,
    /// Module id when the import resolves inside the graph.
    #[serde(default)]
    pub resolved: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClass {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub properties: Vec<RawMember>,
    #[serde(default)]
    pub methods: Vec<RawMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInterface {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub properties: Vec<RawMember>,
    #[serde(default)]
    pub methods: Vec<RawMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub id: String,
    pub name: String,
}

/// A relationship between two raw entities. Untyped relationships are kept
/// untyped until a transform needs a kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRelationship {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: Option<EdgeKind>,
}
