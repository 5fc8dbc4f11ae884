//! Edge consolidation: parallel-edge bundling and highway routing
//!
//! Both techniques are skipped on small graphs, where the bookkeeping costs
//! more than the rendering it saves. Below the threshold the input slice is
//! handed back as-is.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::hierarchy::ParentMap;
use crate::model::{
    kind_priority, EdgeId, EdgeKind, GraphEdge, GraphNode, GroupKind, HighwaySegment, NodeId,
};

/// Edge count below which consolidation is a no-op.
pub const CONSOLIDATION_THRESHOLD: usize = 50;

/// Handle names used to attach highway segments to folder boundaries.
pub const HIGHWAY_OUT_HANDLE: &str = "highway-out";
pub const HIGHWAY_IN_HANDLE: &str = "highway-in";

fn member_count(edge: &GraphEdge) -> usize {
    edge.data.bundled_count.unwrap_or(1)
}

/// Merge `members` into one edge represented by the highest-priority kind.
/// Ties go to the first-seen member.
fn merge_bundle(members: &[&GraphEdge]) -> GraphEdge {
    let mut representative = members[0];
    for candidate in &members[1..] {
        if kind_priority(candidate.kind) > kind_priority(representative.kind) {
            representative = *candidate;
        }
    }
    let kinds: BTreeSet<EdgeKind> = members.iter().flat_map(|e| e.all_kinds()).collect();
    let mut bundled = representative.clone();
    bundled.data.bundled_kinds = kinds.into_iter().collect();
    bundled.data.bundled_count = Some(members.iter().map(|e| member_count(e)).sum());
    bundled.hidden = members.iter().all(|e| e.hidden);
    bundled
}

/// Bundle edges sharing `(source, target)` into one representative edge.
///
/// Groups containing a highway trunk are left alone. Returns the input
/// unchanged (borrowed) below [`CONSOLIDATION_THRESHOLD`].
pub fn bundle_parallel_edges(edges: &[GraphEdge]) -> Cow<'_, [GraphEdge]> {
    if edges.len() < CONSOLIDATION_THRESHOLD {
        return Cow::Borrowed(edges);
    }

    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut groups: HashMap<(&str, &str), Vec<&GraphEdge>> = HashMap::new();
    for edge in edges {
        let key = (edge.source.as_str(), edge.target.as_str());
        let group = groups.entry(key).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(edge);
    }

    let mut out = Vec::with_capacity(order.len());
    let mut merged = 0usize;
    for key in order {
        let members = &groups[&key];
        if members.len() > 1 && !members.iter().any(|e| e.is_trunk()) {
            out.push(merge_bundle(members));
            merged += members.len() - 1;
        } else {
            out.extend(members.iter().map(|e| (*e).clone()));
        }
    }
    if merged > 0 {
        tracing::debug!(merged, remaining = out.len(), "bundled parallel edges");
    }
    Cow::Owned(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighwayOptions {
    /// Smallest group of boundary-crossing edges worth a highway.
    pub min_group_size: usize,
}

impl Default for HighwayOptions {
    fn default() -> Self {
        HighwayOptions { min_group_size: 3 }
    }
}

/// Outermost folder around `id` that does not also contain `other`.
fn boundary_folder<'a>(
    parents: &'a ParentMap,
    folders: &HashSet<&str>,
    id: &str,
    other: &str,
) -> Option<&'a NodeId> {
    let other_ancestors: HashSet<&str> = parents.ancestors(other).into_iter().map(String::as_str).collect();
    parents
        .ancestors(id)
        .into_iter()
        .filter(|a| folders.contains(a.as_str()) && !other_ancestors.contains(a.as_str()) && a.as_str() != other)
        .last()
}

/// Aggregate dense folder-to-folder traffic into entry, trunk and exit
/// segments. Edges that already carry a segment role are left alone.
pub fn route_highways<'a>(
    nodes: &[GraphNode],
    edges: &'a [GraphEdge],
    options: HighwayOptions,
) -> Cow<'a, [GraphEdge]> {
    if edges.len() < CONSOLIDATION_THRESHOLD {
        return Cow::Borrowed(edges);
    }

    let parents = ParentMap::from_nodes(nodes);
    let folders: HashSet<&str> = nodes
        .iter()
        .filter(|n| n.group_kind() == Some(GroupKind::Folder))
        .map(|n| n.id.as_str())
        .collect();

    let mut lane_of: Vec<Option<(NodeId, NodeId)>> = Vec::with_capacity(edges.len());
    let mut lanes: HashMap<(NodeId, NodeId), Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        let lane = if edge.data.highway_segment.is_some() {
            None
        } else {
            let from = boundary_folder(&parents, &folders, &edge.source, &edge.target);
            let to = boundary_folder(&parents, &folders, &edge.target, &edge.source);
            from.zip(to).map(|(f, t)| (f.clone(), t.clone()))
        };
        if let Some(lane) = &lane {
            lanes.entry(lane.clone()).or_default().push(i);
        }
        lane_of.push(lane);
    }

    lanes.retain(|_, members| members.len() >= options.min_group_size);
    if lanes.is_empty() {
        return Cow::Owned(edges.to_vec());
    }

    let mut out: Vec<GraphEdge> = Vec::with_capacity(edges.len());
    let mut seen: HashSet<EdgeId> = HashSet::new();
    let mut emitted: HashSet<(NodeId, NodeId)> = HashSet::new();
    // segments may share a key with a pass-through edge; first seen wins
    let mut push = |out: &mut Vec<GraphEdge>, edge: GraphEdge| {
        if seen.insert(edge.key()) {
            out.push(edge);
        }
    };
    for (i, edge) in edges.iter().enumerate() {
        let Some(lane) = lane_of[i].as_ref().filter(|l| lanes.contains_key(*l)) else {
            push(&mut out, edge.clone());
            continue;
        };
        if !emitted.insert(lane.clone()) {
            continue;
        }
        let members: Vec<&GraphEdge> = lanes[lane].iter().map(|&m| &edges[m]).collect();
        for segment in highway_segments(&lane.0, &lane.1, &members) {
            push(&mut out, segment);
        }
    }

    tracing::debug!(highways = emitted.len(), before = edges.len(), after = out.len(), "routed highways");
    Cow::Owned(out)
}

fn highway_segments(from: &NodeId, to: &NodeId, members: &[&GraphEdge]) -> Vec<GraphEdge> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    let mut exits = Vec::new();
    for edge in members {
        let mut entry = GraphEdge::new(edge.source.clone(), from.clone(), edge.kind);
        if seen.insert(entry.id.clone()) {
            entry.hidden = edge.hidden;
            entry.data.source_handle = edge.data.source_handle.clone();
            entry.data.target_handle = Some(HIGHWAY_OUT_HANDLE.to_string());
            entry.data.highway_segment = Some(HighwaySegment::Entry);
            entries.push(entry);
        }
        let mut exit = GraphEdge::new(to.clone(), edge.target.clone(), edge.kind);
        if seen.insert(exit.id.clone()) {
            exit.hidden = edge.hidden;
            exit.data.source_handle = Some(HIGHWAY_IN_HANDLE.to_string());
            exit.data.target_handle = edge.data.target_handle.clone();
            exit.data.highway_segment = Some(HighwaySegment::Exit);
            exits.push(exit);
        }
    }

    let bundle = merge_bundle(members);
    let mut trunk = GraphEdge::new(from.clone(), to.clone(), bundle.kind);
    trunk.hidden = bundle.hidden;
    trunk.data.bundled_kinds = bundle.data.bundled_kinds;
    trunk.data.bundled_count = bundle.data.bundled_count;
    trunk.data.highway_segment = Some(HighwaySegment::Highway);
    trunk.data.source_handle = Some(HIGHWAY_OUT_HANDLE.to_string());
    trunk.data.target_handle = Some(HIGHWAY_IN_HANDLE.to_string());

    let mut segments = entries;
    segments.push(trunk);
    segments.extend(exits);
    segments
}
