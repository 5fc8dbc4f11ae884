//! Trellis Core — dependency view model, graph reductions and view builder

pub mod builder;
pub mod clustering;
pub mod collapse;
pub mod consolidate;
pub mod cycles;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod model;
pub mod preferences;
pub mod search;
pub mod source;
pub mod store;
pub mod testfiles;
pub mod transition;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use builder::{BuildOptions, GraphViewBuilder, ViewSnapshot};
pub use clustering::cluster_by_folder;
pub use collapse::{collapse_folders, FolderCollapse, FolderCollapseMeta};
pub use consolidate::{bundle_parallel_edges, route_highways, HighwayOptions, CONSOLIDATION_THRESHOLD};
pub use cycles::{collapse_cycles, find_module_cycles, CycleCollapse, SccGroup};
pub use error::{CoreError, Result};
pub use geometry::{Point, Rect, Size, Viewport};
pub use hierarchy::{absolute_rects, ParentMap};
pub use model::{
    edge_key, kind_priority, EdgeData, EdgeId, EdgeKind, GraphEdge, GraphNode, GroupInfo,
    GroupKind, HighwaySegment, NodeData, NodeDiagnostics, NodeId, NodeKind, RawGraph,
};
pub use preferences::{
    LayoutConfig, LayoutDirection, Preferences, ViewMode, ViewPreferences, VirtualizationConfig,
};
pub use search::{Direction, SearchHit, SemanticGraph};
pub use source::load_raw_graph;
pub use store::{ChangeOrigin, ChangeScope, EdgePatch, GraphStore, SharedStore, StoreChange};
pub use transition::{NoopGate, TransitionGate};
