//! Layout orchestration
//!
//! One run walks `Pending → (hit: Fitting) | (miss: Computing → Measuring?
//! → Recomputing? → Fitting) → Idle`. Every await is a point where a newer
//! run may have started or the graph may have changed, so results are
//! checked against the run's version and the graph's cache key before they
//! are committed. Superseded results are dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use trellis_core::{
    ChangeOrigin, GraphNode, LayoutConfig, NodeId, NoopGate, Point, SharedStore, Size,
    TransitionGate,
};

use crate::cache::{cache_key, LayoutCache};
use crate::diff::ChangeTracker;
use crate::surface::RenderSurface;
use crate::worker::{LayoutRequest, LayoutResponse, LayoutWorker};

/// Measured sizes must differ by more than this to trigger a relayout.
pub const MEASURE_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPhase {
    Idle,
    Pending,
    Computing,
    Measuring,
    Recomputing,
    Fitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOutcome {
    /// Stored geometry was reused; no worker request was made.
    CacheHit { version: u64 },
    Computed {
        version: u64,
        /// 1, or 2 when containers were re-measured and laid out again.
        passes: u8,
        /// Nodes whose geometry changed beyond tolerance.
        changed: usize,
    },
    /// Superseded by a newer run or a graph change.
    Stale { version: u64 },
    /// The worker failed; the previous geometry stays committed.
    Failed { version: u64 },
    /// Another initialization is in flight; this request will run after it
    /// unless a newer one replaces it.
    Deferred,
}

#[derive(Debug)]
struct RunState {
    phase: LayoutPhase,
    initializing: bool,
    pending: Option<LayoutConfig>,
}

/// Drives layout requests for the nodes and edges held in the store.
pub struct LayoutOrchestrator {
    store: SharedStore,
    worker: Arc<dyn LayoutWorker>,
    surface: Arc<dyn RenderSurface>,
    gate: Arc<dyn TransitionGate>,
    cache: Mutex<LayoutCache>,
    /// Last measured size of every container, by node id.
    measured: Mutex<HashMap<NodeId, Size>>,
    tracker: Mutex<ChangeTracker>,
    version: AtomicU64,
    state: Mutex<RunState>,
}

/// Suspends the gate for the duration of a run and resumes it on every
/// exit path.
struct Transition<'a> {
    orchestrator: &'a LayoutOrchestrator,
}

impl<'a> Transition<'a> {
    fn begin(orchestrator: &'a LayoutOrchestrator) -> Self {
        orchestrator.gate.suspend();
        orchestrator.set_phase(LayoutPhase::Pending);
        Transition { orchestrator }
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.orchestrator.set_phase(LayoutPhase::Idle);
        self.orchestrator.gate.resume();
    }
}

impl LayoutOrchestrator {
    pub fn new(store: SharedStore, worker: Arc<dyn LayoutWorker>, surface: Arc<dyn RenderSurface>) -> Self {
        LayoutOrchestrator {
            store,
            worker,
            surface,
            gate: Arc::new(NoopGate),
            cache: Mutex::new(LayoutCache::default()),
            measured: Mutex::new(HashMap::new()),
            tracker: Mutex::new(ChangeTracker::new()),
            version: AtomicU64::new(0),
            state: Mutex::new(RunState {
                phase: LayoutPhase::Idle,
                initializing: false,
                pending: None,
            }),
        }
    }

    /// Gate suspended while a run is in progress.
    pub fn with_gate(mut self, gate: Arc<dyn TransitionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_cache(mut self, cache: LayoutCache) -> Self {
        self.cache = Mutex::new(cache);
        self
    }

    pub fn phase(&self) -> LayoutPhase {
        self.state.lock().phase
    }

    /// Version of the most recently started run.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Last measured size of a container, if it was part of a recent run.
    pub fn measured_size(&self, id: &str) -> Option<Size> {
        self.measured.lock().get(id).copied()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        self.measured.lock().clear();
    }

    /// Drop cached state and invalidate any run still in flight.
    pub fn dispose(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.clear_cache();
        let mut state = self.state.lock();
        state.pending = None;
        debug!("layout orchestrator disposed");
    }

    /// Initial layout. Only one runs at a time; requests arriving meanwhile
    /// replace each other, and the latest one runs when the current one
    /// finishes. The caller that started the chain gets the final outcome.
    pub async fn initialize(&self, config: LayoutConfig) -> LayoutOutcome {
        {
            let mut state = self.state.lock();
            if state.initializing {
                debug!("layout initialization in flight, deferring request");
                state.pending = Some(config);
                return LayoutOutcome::Deferred;
            }
            state.initializing = true;
        }

        let mut outcome = self.layout(config).await;
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.pending.take() {
                    Some(next) => next,
                    None => {
                        state.initializing = false;
                        break;
                    }
                }
            };
            outcome = self.layout(next).await;
        }
        outcome
    }

    /// Lay out the current store contents and commit the result.
    pub async fn layout(&self, config: LayoutConfig) -> LayoutOutcome {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let _transition = Transition::begin(self);

        let (nodes, edges) = {
            let store = self.store.read().await;
            (store.nodes().to_vec(), store.edges().to_vec())
        };
        let key = cache_key(&nodes, &edges, &config);

        let cached = self.cache.lock().get(&key).map(|entry| entry.nodes.clone());
        if let Some(geometry) = cached {
            debug!(version, nodes = nodes.len(), "layout cache hit");
            let laid = transfer_geometry(&nodes, &geometry);
            return match self.commit(version, &key, laid, &config).await {
                Some(_) => LayoutOutcome::CacheHit { version },
                None => LayoutOutcome::Stale { version },
            };
        }

        self.set_phase(LayoutPhase::Computing);
        let hints = self.measured.lock().clone();
        let request = LayoutRequest {
            version,
            nodes: strip_geometry(&nodes, &hints),
            edges: edges.clone(),
            config: config.clone(),
        };
        let mut response = match self.request(request).await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        let mut passes = 1;
        if config.two_pass {
            self.set_phase(LayoutPhase::Measuring);
            let measurement = self.surface.measure(&response.nodes).await;
            match measurement {
                Ok(measured) => {
                    if !self.is_current(version) {
                        debug!(version, "layout superseded during measurement");
                        return LayoutOutcome::Stale { version };
                    }
                    let corrections = self.corrections(&response.nodes, &measured);
                    {
                        let live: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
                        let mut cache = self.measured.lock();
                        cache.retain(|id, _| live.contains(id.as_str()));
                        cache.extend(measured);
                    }
                    if !corrections.is_empty() {
                        self.set_phase(LayoutPhase::Recomputing);
                        debug!(version, containers = corrections.len(), "re-running layout with measured sizes");
                        let mut hints = hints;
                        hints.extend(corrections);
                        let request = LayoutRequest {
                            version,
                            nodes: strip_geometry(&nodes, &hints),
                            edges: edges.clone(),
                            config: config.clone(),
                        };
                        response = match self.request(request).await {
                            Ok(response) => response,
                            Err(outcome) => return outcome,
                        };
                        passes = 2;
                    }
                }
                Err(e) => warn!("Container measurement failed, keeping first pass: {}", e),
            }
        }

        // the worker's reply only contributes geometry
        let geometry = transfer_geometry(&nodes, &response.nodes);
        let Some(changed) = self.commit(version, &key, geometry.clone(), &config).await else {
            return LayoutOutcome::Stale { version };
        };
        self.cache.lock().insert(key, geometry, edges);
        info!(version, passes, changed, "layout committed");
        LayoutOutcome::Computed {
            version,
            passes,
            changed,
        }
    }

    async fn request(&self, request: LayoutRequest) -> Result<LayoutResponse, LayoutOutcome> {
        let version = request.version;
        let requested: Vec<NodeId> = request.nodes.iter().map(|n| n.id.clone()).collect();
        match self.worker.compute(request).await {
            Ok(response) if response.version == version && self.is_current(version) => {
                let returned: HashSet<&str> = response.nodes.iter().map(|n| n.id.as_str()).collect();
                let missing = requested.iter().filter(|id| !returned.contains(id.as_str())).count();
                if missing > 0 {
                    warn!(version, missing, "Layout response is missing nodes, discarding it");
                    return Err(LayoutOutcome::Failed { version });
                }
                Ok(response)
            }
            Ok(response) => {
                debug!(version, received = response.version, "discarding stale layout response");
                Err(LayoutOutcome::Stale { version })
            }
            Err(e) => {
                warn!(version, "Layout worker failed: {}", e);
                Err(LayoutOutcome::Failed { version })
            }
        }
    }

    /// Containers whose measured size differs from both the laid-out size
    /// and the last measurement.
    fn corrections(&self, laid: &[GraphNode], measured: &HashMap<NodeId, Size>) -> HashMap<NodeId, Size> {
        let previous = self.measured.lock();
        laid.iter()
            .filter(|n| n.kind.is_container())
            .filter_map(|node| {
                let size = *measured.get(&node.id)?;
                let laid_size = node.size.unwrap_or_default();
                let differs_from_frame = size.max_delta(laid_size) > MEASURE_TOLERANCE;
                let differs_from_cache = previous
                    .get(&node.id)
                    .is_none_or(|cached| size.max_delta(*cached) > MEASURE_TOLERANCE);
                (differs_from_frame && differs_from_cache).then(|| (node.id.clone(), size))
            })
            .collect()
    }

    /// Replace nodes and edges in one step, notify the surface and fit the
    /// view once. Returns the number of changed nodes, or `None` when the
    /// run was superseded or the graph changed underneath it.
    async fn commit(&self, version: u64, key: &str, mut laid: Vec<GraphNode>, config: &LayoutConfig) -> Option<usize> {
        apply_offsets(&mut laid, &config.offsets);
        self.set_phase(LayoutPhase::Fitting);

        let (changes, committed) = {
            let mut store = self.store.write().await;
            if !self.is_current(version) {
                debug!(version, "layout superseded before commit");
                return None;
            }
            if cache_key(store.nodes(), store.edges(), config) != key {
                debug!(version, "graph changed during layout, discarding result");
                return None;
            }
            let previous = store.nodes().to_vec();
            let edges = store.edges().to_vec();
            let committed = laid.clone();
            store.replace_nodes(laid, ChangeOrigin::Layout);
            store.replace_edges(edges, ChangeOrigin::Layout);
            let changes = self.tracker.lock().detect(&previous, &committed);
            (changes, committed)
        };

        self.surface.nodes_changed(&changes);
        if let Err(e) = self.surface.fit_view(&committed).await {
            warn!("Fit view failed: {}", e);
        }
        Some(changes.changed.len() + changes.added.len())
    }

    fn is_current(&self, version: u64) -> bool {
        self.version.load(Ordering::SeqCst) == version
    }

    fn set_phase(&self, phase: LayoutPhase) {
        self.state.lock().phase = phase;
    }
}

/// Request copy of `nodes` without geometry. Containers with a known
/// measurement carry it as a minimum size.
fn strip_geometry(nodes: &[GraphNode], hints: &HashMap<NodeId, Size>) -> Vec<GraphNode> {
    nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            node.position = Point::default();
            node.size = if node.kind.is_container() {
                hints.get(&node.id).copied()
            } else {
                None
            };
            node
        })
        .collect()
}

fn transfer_geometry(nodes: &[GraphNode], geometry: &[GraphNode]) -> Vec<GraphNode> {
    let by_id: HashMap<&str, &GraphNode> = geometry.iter().map(|n| (n.id.as_str(), n)).collect();
    nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            if let Some(laid) = by_id.get(node.id.as_str()) {
                node.position = laid.position;
                node.size = laid.size;
            }
            node
        })
        .collect()
}

fn apply_offsets(nodes: &mut [GraphNode], offsets: &BTreeMap<String, Point>) {
    if offsets.is_empty() {
        return;
    }
    for node in nodes.iter_mut() {
        if let Some(offset) = offsets.get(&node.id) {
            node.position = node.position.offset(*offset);
        }
    }
}
