//! Weight-bounded LRU cache of computed geometries

use indexmap::IndexMap;
use trellis_core::{GraphEdge, GraphNode, LayoutConfig};

pub const MAX_ENTRIES: usize = 8;
pub const MAX_WEIGHT: usize = 220_000;

const NODE_WEIGHT: usize = 18;
const EDGE_WEIGHT: usize = 10;

pub fn entry_weight(nodes: usize, edges: usize) -> usize {
    NODE_WEIGHT * nodes + EDGE_WEIGHT * edges
}

/// Cache key over sorted node and edge ids, a hash of the layout-relevant
/// content, and the layout configuration. Geometry, visibility and
/// diagnostics are not part of the key.
pub fn cache_key(nodes: &[GraphNode], edges: &[GraphEdge], config: &LayoutConfig) -> String {
    let mut node_ids: Vec<&GraphNode> = nodes.iter().collect();
    node_ids.sort_by(|a, b| a.id.cmp(&b.id));
    let mut edge_ids: Vec<&str> = edges.iter().map(|e| e.id.as_str()).collect();
    edge_ids.sort_unstable();

    let mut ids = blake3::Hasher::new();
    let mut content = blake3::Hasher::new();
    for node in &node_ids {
        ids.update(node.id.as_bytes());
        ids.update(&[0]);
        content.update(node.id.as_bytes());
        content.update(format!("{:?}", node.kind).as_bytes());
        content.update(node.parent_id.as_deref().unwrap_or("").as_bytes());
        content.update(node.data.label.as_bytes());
        content.update(&[u8::from(node.data.is_collapsed)]);
        content.update(&node.data.child_count.unwrap_or(0).to_le_bytes());
        content.update(&[0]);
    }
    ids.update(&[1]);
    for id in &edge_ids {
        ids.update(id.as_bytes());
        ids.update(&[0]);
    }

    let ids = ids.finalize().to_hex();
    let content = content.finalize().to_hex();
    format!("{}:{}:{}", ids, &content[..16], config.summary())
}

#[derive(Debug, Clone)]
pub struct LayoutCacheEntry {
    pub key: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub weight: usize,
}

/// Entries are kept oldest first; a hit moves the entry to the back.
#[derive(Debug)]
pub struct LayoutCache {
    entries: IndexMap<String, LayoutCacheEntry>,
    total_weight: usize,
    max_entries: usize,
    max_weight: usize,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new(MAX_ENTRIES, MAX_WEIGHT)
    }
}

impl LayoutCache {
    pub fn new(max_entries: usize, max_weight: usize) -> Self {
        LayoutCache {
            entries: IndexMap::new(),
            total_weight: 0,
            max_entries,
            max_weight,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> usize {
        self.total_weight
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys from oldest to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&mut self, key: &str) -> Option<&LayoutCacheEntry> {
        let entry = self.entries.shift_remove(key)?;
        self.entries.insert(entry.key.clone(), entry);
        self.entries.get(key)
    }

    /// Insert, evicting oldest entries until both bounds hold. Returns the
    /// evicted keys. An entry heavier than the whole budget is not stored.
    pub fn insert(&mut self, key: String, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Vec<String> {
        let weight = entry_weight(nodes.len(), edges.len());
        if let Some(old) = self.entries.shift_remove(&key) {
            self.total_weight -= old.weight;
        }
        if weight > self.max_weight {
            tracing::debug!(weight, "layout too heavy to cache");
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while !self.entries.is_empty()
            && (self.entries.len() + 1 > self.max_entries || self.total_weight + weight > self.max_weight)
        {
            if let Some((old_key, old)) = self.entries.shift_remove_index(0) {
                self.total_weight -= old.weight;
                evicted.push(old_key);
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "evicted cached layouts");
        }

        self.total_weight += weight;
        self.entries.insert(
            key.clone(),
            LayoutCacheEntry {
                key,
                nodes,
                edges,
                weight,
            },
        );
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_weight = 0;
    }
}
