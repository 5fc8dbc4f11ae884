//! Built-in layered layout engine
//!
//! Lays out each container's children independently, innermost first, so
//! that a container's size is known before its siblings are placed:
//!
//! 1. edges are lifted to the pair of siblings under their lowest common
//!    ancestor
//! 2. siblings are ranked by longest path over the SCC condensation, so
//!    cycles share a layer instead of stretching the drawing
//! 3. each layer is ordered by the barycentre of its predecessors
//! 4. layers are stacked along the main axis and centred on the cross axis
//!
//! Child positions are relative to their parent's top-left corner. A
//! `size` already present on a node is treated as a minimum.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use trellis_core::{LayoutConfig, LayoutDirection, Point, Size};

use crate::error::{LayoutError, Result};
use crate::worker::{LayoutRequest, LayoutResponse};

/// A synchronous layout algorithm, run on the worker thread.
pub trait LayoutEngine: Send + 'static {
    fn layout(&mut self, request: LayoutRequest) -> Result<LayoutResponse>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LayeredEngine;

impl LayoutEngine for LayeredEngine {
    fn layout(&mut self, request: LayoutRequest) -> Result<LayoutResponse> {
        validate(&request.config)?;
        let LayoutRequest {
            version,
            mut nodes,
            edges,
            config,
        } = request;

        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        let parent = effective_parents(&nodes, &index);
        let children = children_of(&parent);
        let order = top_down_order(&parent, &children);

        let mut level_edges: HashMap<Option<usize>, Vec<(usize, usize)>> = HashMap::new();
        for edge in &edges {
            let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
                continue;
            };
            if let Some((level, a, b)) = sibling_pair(&parent, s, t) {
                level_edges.entry(level).or_default().push((a, b));
            }
        }

        let mut sizes: Vec<Size> = nodes.iter().map(|n| n.size.unwrap_or(config.node_size)).collect();
        let mut positions: Vec<Point> = vec![Point::default(); nodes.len()];

        for &container in order.iter().rev() {
            let Some(kids) = children.get(&Some(container)) else {
                continue;
            };
            let empty = Vec::new();
            let lifted = level_edges.get(&Some(container)).unwrap_or(&empty);
            let (placed, bounds) = place_siblings(kids, lifted, &sizes, &config);
            let inset = Point::new(config.padding, config.header_height + config.padding);
            for (child, at) in placed {
                positions[child] = at.offset(inset);
            }
            let packed = Size::new(
                bounds.width + 2.0 * config.padding,
                bounds.height + 2.0 * config.padding + config.header_height,
            );
            let hint = nodes[container].size;
            sizes[container] = match hint {
                Some(hint) => Size::new(packed.width.max(hint.width), packed.height.max(hint.height)),
                None => packed,
            };
        }

        if let Some(roots) = children.get(&None) {
            let empty = Vec::new();
            let lifted = level_edges.get(&None).unwrap_or(&empty);
            let (placed, _) = place_siblings(roots, lifted, &sizes, &config);
            for (node, at) in placed {
                positions[node] = at;
            }
        }

        for (i, node) in nodes.iter_mut().enumerate() {
            node.position = positions[i];
            node.size = Some(sizes[i]);
            node.parent_id = parent[i].map(|p| ids[p].clone());
        }

        Ok(LayoutResponse { version, nodes, edges })
    }
}

fn validate(config: &LayoutConfig) -> Result<()> {
    let values = [
        config.node_spacing,
        config.layer_spacing,
        config.padding,
        config.header_height,
        config.node_size.width,
        config.node_size.height,
    ];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(LayoutError::Engine(format!(
            "spacing and sizes must be finite and non-negative: {}",
            config.summary()
        )));
    }
    Ok(())
}

/// Parent index per node. Missing parents and parent cycles are cut so
/// every node ends up under a root.
fn effective_parents(nodes: &[trellis_core::GraphNode], index: &HashMap<&str, usize>) -> Vec<Option<usize>> {
    let mut parent: Vec<Option<usize>> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| {
            n.parent_id
                .as_deref()
                .and_then(|p| index.get(p).copied())
                .filter(|p| *p != i)
        })
        .collect();

    let mut reached = vec![false; nodes.len()];
    loop {
        let children = children_of(&parent);
        let mut queue: VecDeque<usize> = children.get(&None).cloned().unwrap_or_default().into();
        while let Some(node) = queue.pop_front() {
            if reached[node] {
                continue;
            }
            reached[node] = true;
            if let Some(kids) = children.get(&Some(node)) {
                queue.extend(kids.iter().copied());
            }
        }
        match reached.iter().position(|r| !r) {
            Some(stuck) => {
                tracing::debug!(node = %nodes[stuck].id, "breaking parent cycle");
                parent[stuck] = None;
            }
            None => break,
        }
    }
    parent
}

fn children_of(parent: &[Option<usize>]) -> HashMap<Option<usize>, Vec<usize>> {
    let mut children: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
    for (i, p) in parent.iter().enumerate() {
        children.entry(*p).or_default().push(i);
    }
    children
}

/// Breadth-first order from the roots; reversed, children come before
/// their parents.
fn top_down_order(parent: &[Option<usize>], children: &HashMap<Option<usize>, Vec<usize>>) -> Vec<usize> {
    let mut order = Vec::with_capacity(parent.len());
    let mut queue: VecDeque<usize> = children.get(&None).cloned().unwrap_or_default().into();
    while let Some(node) = queue.pop_front() {
        order.push(node);
        if let Some(kids) = children.get(&Some(node)) {
            queue.extend(kids.iter().copied());
        }
    }
    order
}

fn chain(parent: &[Option<usize>], node: usize) -> Vec<usize> {
    let mut chain = vec![node];
    let mut current = parent[node];
    while let Some(p) = current {
        if chain.len() > parent.len() {
            break;
        }
        chain.push(p);
        current = parent[p];
    }
    chain
}

/// The two distinct siblings an edge connects, and their shared parent.
/// Edges between a node and its own ancestor have no pair.
fn sibling_pair(parent: &[Option<usize>], s: usize, t: usize) -> Option<(Option<usize>, usize, usize)> {
    let source_chain = chain(parent, s);
    let target_chain = chain(parent, t);
    let target_set: HashSet<usize> = target_chain.iter().copied().collect();
    let common = source_chain.iter().position(|n| target_set.contains(n));

    let (level, a, b) = match common {
        Some(0) => return None,
        Some(i) => {
            let lca = source_chain[i];
            let j = target_chain.iter().position(|n| *n == lca)?;
            if j == 0 {
                return None;
            }
            (Some(lca), source_chain[i - 1], target_chain[j - 1])
        }
        None => (None, *source_chain.last()?, *target_chain.last()?),
    };
    (a != b).then_some((level, a, b))
}

/// Place siblings in layers. Returns positions relative to the level's
/// content origin and the bounding size.
fn place_siblings(
    nodes: &[usize],
    edges: &[(usize, usize)],
    sizes: &[Size],
    config: &LayoutConfig,
) -> (Vec<(usize, Point)>, Size) {
    let local: HashMap<usize, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(nodes.len(), edges.len());
    let handles: Vec<NodeIndex> = nodes.iter().map(|n| graph.add_node(*n)).collect();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (a, b) in edges {
        if let (Some(&la), Some(&lb)) = (local.get(a), local.get(b)) {
            graph.update_edge(handles[la], handles[lb], ());
            preds[lb].push(la);
        }
    }

    // tarjan_scc yields components in reverse topological order
    let components = tarjan_scc(&graph);
    let mut component_of = vec![0usize; nodes.len()];
    for (c, members) in components.iter().enumerate() {
        for member in members {
            component_of[member.index()] = c;
        }
    }
    let mut rank = vec![0usize; components.len()];
    for c in (0..components.len()).rev() {
        for member in &components[c] {
            for next in graph.neighbors(*member) {
                let d = component_of[next.index()];
                if d != c {
                    rank[d] = rank[d].max(rank[c] + 1);
                }
            }
        }
    }

    let layer_count = rank.iter().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for i in 0..nodes.len() {
        layers[rank[component_of[i]]].push(i);
    }

    let mut slot = vec![0usize; nodes.len()];
    for layer in layers.iter_mut() {
        let keys: HashMap<usize, f64> = layer
            .iter()
            .enumerate()
            .map(|(current, &n)| {
                let placed: Vec<f64> = preds[n]
                    .iter()
                    .filter(|p| rank[component_of[**p]] < rank[component_of[n]])
                    .map(|p| slot[*p] as f64)
                    .collect();
                let key = if placed.is_empty() {
                    current as f64
                } else {
                    placed.iter().sum::<f64>() / placed.len() as f64
                };
                (n, key)
            })
            .collect();
        layer.sort_by(|a, b| keys[a].total_cmp(&keys[b]));
        for (i, n) in layer.iter().enumerate() {
            slot[*n] = i;
        }
    }

    let down = config.direction == LayoutDirection::Down;
    let cross = |s: Size| if down { s.width } else { s.height };
    let main = |s: Size| if down { s.height } else { s.width };

    let breadths: Vec<f64> = layers
        .iter()
        .map(|layer| {
            let total: f64 = layer.iter().map(|n| cross(sizes[nodes[*n]])).sum();
            total + config.node_spacing * layer.len().saturating_sub(1) as f64
        })
        .collect();
    let max_breadth = breadths.iter().copied().fold(0.0, f64::max);

    let mut placed = Vec::with_capacity(nodes.len());
    let mut main_offset = 0.0;
    for (layer, breadth) in layers.iter().zip(&breadths) {
        let thickness = layer.iter().map(|n| main(sizes[nodes[*n]])).fold(0.0, f64::max);
        let mut cross_offset = (max_breadth - breadth) / 2.0;
        for n in layer {
            let size = sizes[nodes[*n]];
            let at = if down {
                Point::new(cross_offset, main_offset)
            } else {
                Point::new(main_offset, cross_offset)
            };
            placed.push((nodes[*n], at));
            cross_offset += cross(size) + config.node_spacing;
        }
        main_offset += thickness + config.layer_spacing;
    }
    let total_main = (main_offset - config.layer_spacing).max(0.0);
    let bounds = if down {
        Size::new(max_breadth, total_main)
    } else {
        Size::new(total_main, max_breadth)
    };
    (placed, bounds)
}
