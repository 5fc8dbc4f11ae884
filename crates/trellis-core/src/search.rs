//! Search and traversal over the semantic snapshot
//!
//! The semantic graph is the filtered graph before any grouping, so ids
//! here always refer to real code entities.

use std::collections::{HashMap, HashSet, VecDeque};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;

use crate::model::{EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub score: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl SemanticGraph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        SemanticGraph { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Fuzzy match against labels and paths, best first. Ties keep
    /// snapshot order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let matcher = SkimMatcherV2::default();
        let mut hits: Vec<SearchHit> = self
            .nodes
            .iter()
            .filter_map(|node| {
                let label = fuzzy_match_score(&matcher, &node.data.label, query);
                let path = node
                    .data
                    .path
                    .as_deref()
                    .and_then(|p| fuzzy_match_score(&matcher, p, query));
                let score = label.max(path)?;
                Some(SearchHit {
                    id: node.id.clone(),
                    kind: node.kind,
                    label: node.data.label.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    fn adjacency(&self, direction: Direction) -> HashMap<&str, Vec<&str>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in self.edges.iter().filter(|e| e.kind != Some(EdgeKind::Contains)) {
            if matches!(direction, Direction::Outgoing | Direction::Both) {
                adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
            }
            if matches!(direction, Direction::Incoming | Direction::Both) {
                adjacency.entry(edge.target.as_str()).or_default().push(edge.source.as_str());
            }
        }
        adjacency
    }

    /// Direct neighbours, sorted and deduplicated.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<NodeId> {
        let adjacency = self.adjacency(direction);
        let mut out: Vec<NodeId> = adjacency
            .get(id)
            .into_iter()
            .flatten()
            .filter(|n| **n != id)
            .map(|n| n.to_string())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Breadth-first reachability along outgoing edges, with hop counts.
    /// The start node is not included.
    pub fn reachable(&self, id: &str, max_depth: usize) -> Vec<(NodeId, usize)> {
        let adjacency = self.adjacency(Direction::Outgoing);
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(id, 0)]);
        let mut out = Vec::new();
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(next) = adjacency.get(current) else {
                continue;
            };
            for &target in next {
                if seen.insert(target) {
                    out.push((target.to_string(), depth + 1));
                    queue.push_back((target, depth + 1));
                }
            }
        }
        out
    }
}
