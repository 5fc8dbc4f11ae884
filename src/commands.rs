//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::json;
use trellis_core::{
    find_module_cycles, load_raw_graph, BuildOptions, ChangeOrigin, Direction, GraphStore,
    GraphViewBuilder, NodeKind, Preferences, SharedStore, Size, ViewSnapshot, Viewport,
};
use trellis_layout::{HeadlessSurface, LayoutOrchestrator, LayoutOutcome, ThreadLayoutWorker};
use trellis_viewport::EdgeVirtualizer;

pub fn load_preferences(path: Option<&Path>) -> anyhow::Result<Preferences> {
    let prefs = Preferences::load(path).context("failed to load preferences")?;
    tracing::debug!(mode = ?prefs.view.mode(), "preferences resolved");
    Ok(prefs)
}

/// Parse `x,y,zoom`.
pub fn parse_viewport(value: &str) -> Result<Viewport, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, zoom] if *zoom > 0.0 => Ok(Viewport { x: *x, y: *y, zoom: *zoom }),
        [_, _, _] => Err("zoom must be positive".into()),
        _ => Err("expected x,y,zoom".into()),
    }
}

fn build_view(graph: &Path, prefs: &Preferences) -> anyhow::Result<ViewSnapshot> {
    let raw = load_raw_graph(graph).with_context(|| format!("failed to read {}", graph.display()))?;
    let options = BuildOptions::from_preferences(&prefs.view)?;
    let snapshot = GraphViewBuilder::new(options).build(&raw);
    tracing::info!("Built view: {} nodes, {} edges", snapshot.nodes.len(), snapshot.edges.len());
    Ok(snapshot)
}

fn store_for(snapshot: &ViewSnapshot) -> SharedStore {
    let mut store = GraphStore::new();
    store.replace_nodes(snapshot.nodes.clone(), ChangeOrigin::Builder);
    store.replace_edges(snapshot.edges.clone(), ChangeOrigin::Builder);
    store.shared()
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn view(graph: &Path, prefs: &Preferences, as_json: bool) -> anyhow::Result<()> {
    let snapshot = build_view(graph, prefs)?;
    if as_json {
        return print_json(&json!({
            "nodes": snapshot.nodes,
            "edges": snapshot.edges,
            "cycles": snapshot.cycles,
            "folders": snapshot.folders,
        }));
    }

    let hidden = snapshot.edges.iter().filter(|e| e.hidden).count();
    println!("mode:    {:?}", prefs.view.mode());
    println!("nodes:   {}", snapshot.nodes.len());
    println!("edges:   {} ({} hidden)", snapshot.edges.len(), hidden);
    println!("cycles:  {}", snapshot.cycles.len());
    println!("folders: {} collapsed", snapshot.folders.len());
    for kind in NodeKind::ALL {
        let count = snapshot.nodes.iter().filter(|n| n.kind == kind).count();
        if count > 0 {
            println!("  {kind:?}: {count}");
        }
    }
    let orphans: Vec<&str> = snapshot
        .nodes
        .iter()
        .filter(|n| n.data.diagnostics.as_ref().is_some_and(|d| d.orphan_global))
        .map(|n| n.id.as_str())
        .collect();
    if !orphans.is_empty() {
        println!("orphans: {}", orphans.join(", "));
    }
    Ok(())
}

pub fn cycles(graph: &Path, prefs: &Preferences) -> anyhow::Result<()> {
    let snapshot = build_view(graph, prefs)?;
    let groups = find_module_cycles(&snapshot.semantic.nodes, &snapshot.semantic.edges);
    if groups.is_empty() {
        println!("no module cycles");
    }
    for group in &groups {
        println!("{} {}", group.label, group.member_ids.join(" -> "));
    }
    Ok(())
}

async fn lay_out(
    snapshot: &ViewSnapshot,
    prefs: &Preferences,
    container: Size,
    virtualizer: Option<&EdgeVirtualizer>,
) -> anyhow::Result<(SharedStore, Arc<HeadlessSurface>, LayoutOutcome)> {
    let store = store_for(snapshot);
    let surface = Arc::new(HeadlessSurface::new(&prefs.layout, Some(container)));
    let mut orchestrator =
        LayoutOrchestrator::new(store.clone(), Arc::new(ThreadLayoutWorker::default()), surface.clone());
    if let Some(virtualizer) = virtualizer {
        orchestrator = orchestrator.with_gate(Arc::new(virtualizer.gate()));
    }

    let outcome = orchestrator.initialize(prefs.layout.clone()).await;
    match outcome {
        LayoutOutcome::Failed { version } => bail!("layout {version} failed"),
        LayoutOutcome::Stale { version } => bail!("layout {version} was superseded"),
        _ => Ok((store, surface, outcome)),
    }
}

pub async fn layout(graph: &Path, prefs: &Preferences, width: f64, height: f64, as_json: bool) -> anyhow::Result<()> {
    let snapshot = build_view(graph, prefs)?;
    let (store, surface, outcome) = lay_out(&snapshot, prefs, Size::new(width, height), None).await?;
    let store = store.read().await;
    if as_json {
        return print_json(&json!({
            "viewport": surface.viewport(),
            "nodes": store.nodes(),
        }));
    }

    println!("{outcome:?}");
    let viewport = surface.viewport();
    println!("viewport: x={:.1} y={:.1} zoom={:.3}", viewport.x, viewport.y, viewport.zoom);
    for node in store.nodes().iter().filter(|n| n.parent_id.is_none()) {
        let size = node.size.unwrap_or_default();
        println!(
            "{:<40} ({:.0}, {:.0}) {:.0}x{:.0}",
            node.id, node.position.x, node.position.y, size.width, size.height
        );
    }
    Ok(())
}

pub async fn visible(
    graph: &Path,
    prefs: &Preferences,
    width: f64,
    height: f64,
    viewport: Option<Viewport>,
) -> anyhow::Result<()> {
    let snapshot = build_view(graph, prefs)?;
    let container = Size::new(width, height);
    let mut virtualizer = EdgeVirtualizer::new(prefs.virtualization.clone());
    let (store, surface, _) = lay_out(&snapshot, prefs, container, Some(&virtualizer)).await?;

    virtualizer.set_container_size(Some(container));
    virtualizer.set_viewport(viewport.unwrap_or_else(|| surface.viewport()));
    let mut store = store.write().await;
    virtualizer.recompute(&mut store);

    let shown: Vec<&str> = store
        .edges()
        .iter()
        .filter(|e| !e.hidden)
        .map(|e| e.id.as_str())
        .collect();
    print_json(&json!({
        "viewport": virtualizer.viewport(),
        "stats": virtualizer.state().stats,
        "visible": shown,
    }))
}

pub fn search(graph: &Path, prefs: &Preferences, query: &str, limit: usize, depth: Option<usize>) -> anyhow::Result<()> {
    let snapshot = build_view(graph, prefs)?;
    let semantic = &snapshot.semantic;
    let hits = semantic.search(query, limit);
    if hits.is_empty() {
        println!("no matches for {query:?}");
        return Ok(());
    }
    for hit in &hits {
        println!("{:>5}  {:<10} {}", hit.score, format!("{:?}", hit.kind), hit.id);
    }

    let best = &hits[0];
    let outgoing = semantic.neighbors(&best.id, Direction::Outgoing);
    let incoming = semantic.neighbors(&best.id, Direction::Incoming);
    println!("\n{}", best.id);
    println!("  depends on: {}", outgoing.join(", "));
    println!("  used by:    {}", incoming.join(", "));
    if let Some(depth) = depth {
        for (id, distance) in semantic.reachable(&best.id, depth) {
            println!("  {distance} {id}");
        }
    }
    Ok(())
}
