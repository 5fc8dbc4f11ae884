//! Viewport-driven edge virtualization
//!
//! Hides edges that are off-screen, or low-priority at low zoom, so the
//! rendering surface only draws what can be seen. The virtualizer tracks
//! which hidden flags it set itself; any other hidden edge belongs to the
//! user and is never revealed, and pinned edges are never hidden.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};
use trellis_core::{
    absolute_rects, kind_priority, ChangeOrigin, ChangeScope, EdgeId, EdgePatch, GraphEdge,
    GraphStore, Rect, Size, StoreChange, Viewport, VirtualizationConfig,
};

use crate::scheduler::{FrameScheduler, SchedulerHandle};

/// Inputs a recompute depends on. An unchanged signature skips the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    node_revision: u64,
    edge_revision: u64,
    /// Bit patterns of the visible rectangle, `None` without a container
    /// size. Any pan, however small, changes it.
    window: Option<[u64; 4]>,
    zoom: u64,
    enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VirtualizationStats {
    pub total: usize,
    pub visible: usize,
    /// Hidden by the virtualizer.
    pub virtualized: usize,
    pub user_hidden: usize,
    pub pinned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VirtualizationState {
    /// Edges this virtualizer hid. Disjoint from user-hidden edges.
    pub own_hidden: HashSet<EdgeId>,
    /// Candidate edges ranked by kind priority, filled at low zoom.
    pub priority_order: Vec<EdgeId>,
    pub signature: Option<Signature>,
    pub stats: VirtualizationStats,
}

pub struct EdgeVirtualizer {
    config: VirtualizationConfig,
    scheduler: FrameScheduler,
    viewport: Viewport,
    container: Option<Size>,
    state: VirtualizationState,
}

impl EdgeVirtualizer {
    pub fn new(config: VirtualizationConfig) -> Self {
        let scheduler = FrameScheduler::new(Duration::from_millis(config.min_frame_gap_ms));
        EdgeVirtualizer {
            config,
            scheduler,
            viewport: Viewport::default(),
            container: None,
            state: VirtualizationState::default(),
        }
    }

    /// Handle to pass to the layout orchestrator as its transition gate.
    pub fn gate(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn state(&self) -> &VirtualizationState {
        &self.state
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.scheduler.schedule();
        }
    }

    /// Container size of the rendering surface, `None` until measured.
    pub fn set_container_size(&mut self, container: Option<Size>) {
        if container != self.container {
            self.container = container;
            self.scheduler.schedule();
        }
    }

    pub fn suspend(&self) {
        self.scheduler.suspend();
    }

    /// Lift a suspension; the next frame recomputes without waiting for
    /// the frame gap.
    pub fn resume(&self) {
        self.scheduler.resume();
    }

    pub fn dispose(&mut self) {
        self.scheduler.dispose();
        self.state = VirtualizationState::default();
    }

    /// React to a store mutation. Echoes of this virtualizer's own patches
    /// are ignored.
    pub fn on_store_change(&mut self, change: &StoreChange) {
        if change.origin == ChangeOrigin::Virtualizer {
            return;
        }
        match &change.scope {
            // a fresh edge set from anyone but the layout carries only the
            // user's visibility
            ChangeScope::Edges if change.origin != ChangeOrigin::Layout => self.state.own_hidden.clear(),
            ChangeScope::EdgePatch(ids) | ChangeScope::Pins(ids) => {
                for id in ids {
                    self.state.own_hidden.remove(id);
                }
            }
            _ => {}
        }
        self.scheduler.schedule();
    }

    /// Per-frame entry point. Recomputes when a request is due.
    pub fn on_frame(&mut self, now: Instant, store: &mut GraphStore) -> Option<StoreChange> {
        if !self.scheduler.poll(now) {
            return None;
        }
        self.recompute(store)
    }

    /// Recompute visibility now and apply it to the store.
    pub fn recompute(&mut self, store: &mut GraphStore) -> Option<StoreChange> {
        let signature = self.signature(store);
        if self.state.signature == Some(signature) {
            trace!("virtualization inputs unchanged");
            return None;
        }

        let live: HashSet<&str> = store.edges().iter().map(|e| e.id.as_str()).collect();
        self.state.own_hidden.retain(|id| live.contains(id.as_str()));
        let user_hidden: HashSet<EdgeId> = store
            .edges()
            .iter()
            .filter(|e| e.hidden && !self.state.own_hidden.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();

        let (virtualized, priority_order) = if signature.enabled {
            self.select_hidden(store, &user_hidden)
        } else {
            (HashSet::new(), Vec::new())
        };

        let mut patches = HashMap::new();
        for edge in store.edges() {
            if user_hidden.contains(&edge.id) {
                continue;
            }
            let hidden = virtualized.contains(&edge.id);
            if hidden != edge.hidden {
                patches.insert(edge.id.clone(), EdgePatch { hidden });
            }
        }

        let stats = VirtualizationStats {
            total: store.edges().len(),
            visible: store.edges().len() - user_hidden.len() - virtualized.len(),
            virtualized: virtualized.len(),
            user_hidden: user_hidden.len(),
            pinned: store.pinned_edges().len(),
        };
        debug!(
            visible = stats.visible,
            virtualized = stats.virtualized,
            user_hidden = stats.user_hidden,
            "edge virtualization recomputed"
        );

        self.state.own_hidden = virtualized;
        self.state.priority_order = priority_order;
        self.state.stats = stats;
        let change = store.patch_edges_by_ids(&patches, ChangeOrigin::Virtualizer);
        self.state.signature = Some(self.signature(store));
        change
    }

    /// Edges to hide, and the priority ranking used at low zoom.
    fn select_hidden(&self, store: &GraphStore, user_hidden: &HashSet<EdgeId>) -> (HashSet<EdgeId>, Vec<EdgeId>) {
        let eligible = store
            .edges()
            .iter()
            .filter(|e| !user_hidden.contains(&e.id) && !store.is_pinned(&e.id));

        let Some(container) = self.container else {
            return (eligible.map(|e| e.id.clone()).collect(), Vec::new());
        };
        let window = self.viewport.visible_rect(container).expand(self.config.overscan);
        let rects = absolute_rects(store.nodes(), Size::default());

        let on_screen = |edge: &GraphEdge| match (rects.get(&edge.source), rects.get(&edge.target)) {
            (Some(source), Some(target)) => source.union(target).intersects(&window),
            _ => false,
        };

        let mut candidates = Vec::new();
        let mut hidden = HashSet::new();
        for edge in eligible {
            if on_screen(edge) {
                candidates.push(edge);
            } else {
                hidden.insert(edge.id.clone());
            }
        }

        if self.viewport.zoom >= self.config.low_detail_zoom {
            return (hidden, Vec::new());
        }
        candidates.sort_by(|a, b| {
            kind_priority(b.kind)
                .cmp(&kind_priority(a.kind))
                .then_with(|| a.id.cmp(&b.id))
        });
        // pinned edges always draw, so the on-screen ones use up budget
        let pinned_on_screen = store
            .edges()
            .iter()
            .filter(|e| store.is_pinned(&e.id) && on_screen(*e))
            .count();
        let budget = self.config.max_low_detail_edges.saturating_sub(pinned_on_screen);
        for edge in candidates.iter().skip(budget) {
            hidden.insert(edge.id.clone());
        }
        let order = candidates.into_iter().map(|e| e.id.clone()).collect();
        (hidden, order)
    }

    fn signature(&self, store: &GraphStore) -> Signature {
        let window = self
            .container
            .map(|container| window_bits(&self.viewport.visible_rect(container)));
        Signature {
            node_revision: store.node_revision(),
            edge_revision: store.edge_revision(),
            window,
            zoom: self.viewport.zoom.to_bits(),
            enabled: store.edges().len() >= self.config.threshold,
        }
    }
}

fn window_bits(rect: &Rect) -> [u64; 4] {
    [rect.min.x, rect.min.y, rect.max.x, rect.max.y].map(f64::to_bits)
}
