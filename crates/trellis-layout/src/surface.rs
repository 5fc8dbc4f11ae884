//! Rendering surface contract and a headless implementation

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use trellis_core::{absolute_rects, GraphNode, LayoutConfig, NodeId, Rect, Size, Viewport};

use crate::diff::GeometryChanges;
use crate::error::Result;

/// What the orchestrator needs from whatever draws the graph.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Actual rendered size of every container node in `nodes`.
    async fn measure(&self, nodes: &[GraphNode]) -> Result<HashMap<NodeId, Size>>;

    /// Fit the committed graph into the visible area.
    async fn fit_view(&self, nodes: &[GraphNode]) -> Result<Viewport>;

    fn nodes_changed(&self, changes: &GeometryChanges);
}

#[derive(Debug)]
struct HeadlessState {
    viewport: Viewport,
    container: Option<Size>,
    last_changes: Option<GeometryChanges>,
}

/// Surface without a display. Containers measure as the larger of their
/// children's extent and their label width.
#[derive(Debug)]
pub struct HeadlessSurface {
    char_width: f64,
    padding: f64,
    header_height: f64,
    fit_padding: f64,
    max_zoom: f64,
    state: Mutex<HeadlessState>,
}

impl HeadlessSurface {
    pub fn new(config: &LayoutConfig, container: Option<Size>) -> Self {
        HeadlessSurface {
            char_width: 8.0,
            padding: config.padding,
            header_height: config.header_height,
            fit_padding: 24.0,
            max_zoom: 2.0,
            state: Mutex::new(HeadlessState {
                viewport: Viewport::default(),
                container,
                last_changes: None,
            }),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    pub fn container(&self) -> Option<Size> {
        self.state.lock().container
    }

    pub fn resize(&self, container: Size) {
        self.state.lock().container = Some(container);
    }

    pub fn last_changes(&self) -> Option<GeometryChanges> {
        self.state.lock().last_changes.clone()
    }

    fn label_width(&self, label: &str) -> f64 {
        label.chars().count() as f64 * self.char_width + 2.0 * self.padding
    }
}

#[async_trait]
impl RenderSurface for HeadlessSurface {
    async fn measure(&self, nodes: &[GraphNode]) -> Result<HashMap<NodeId, Size>> {
        let mut extent: HashMap<&str, (f64, f64)> = HashMap::new();
        for node in nodes {
            let (Some(parent), Some(size)) = (node.parent_id.as_deref(), node.size) else {
                continue;
            };
            let entry = extent.entry(parent).or_insert((0.0, 0.0));
            entry.0 = entry.0.max(node.position.x + size.width);
            entry.1 = entry.1.max(node.position.y + size.height);
        }

        let measured = nodes
            .iter()
            .filter(|n| n.kind.is_container())
            .map(|node| {
                let laid = node.size.unwrap_or_default();
                let label = self.label_width(&node.data.label);
                let size = match extent.get(node.id.as_str()) {
                    Some(&(right, bottom)) => Size::new(
                        (right + self.padding).max(label),
                        (bottom + self.padding).max(self.header_height),
                    ),
                    None => Size::new(laid.width.max(label), laid.height),
                };
                (node.id.clone(), size)
            })
            .collect();
        Ok(measured)
    }

    async fn fit_view(&self, nodes: &[GraphNode]) -> Result<Viewport> {
        let rects = absolute_rects(nodes, Size::default());
        let mut state = self.state.lock();
        let Some(container) = state.container else {
            return Ok(state.viewport);
        };
        if let Some(bounds) = Rect::bounding(rects.values()) {
            state.viewport = Viewport::fit(&bounds, container, self.fit_padding, self.max_zoom);
        }
        Ok(state.viewport)
    }

    fn nodes_changed(&self, changes: &GeometryChanges) {
        tracing::debug!(
            sequence = changes.sequence,
            changed = changes.len(),
            "surface notified of geometry changes"
        );
        self.state.lock().last_changes = Some(changes.clone());
    }
}
