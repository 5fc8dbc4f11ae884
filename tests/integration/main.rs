//! Integration tests for Trellis
//!
//! These tests run the whole pipeline: raw graph document → view builder →
//! layout orchestrator → edge virtualizer, configured from a preferences
//! file.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tempfile::TempDir;
use trellis_core::{
    load_raw_graph, BuildOptions, ChangeOrigin, CoreError, GraphStore, GraphViewBuilder,
    LayoutDirection, NodeKind, Preferences, Size, ViewMode, ViewSnapshot, Viewport,
};
use trellis_layout::{HeadlessSurface, LayoutOrchestrator, LayoutOutcome, ThreadLayoutWorker};
use trellis_viewport::EdgeVirtualizer;

/// `app/a → app/b → app/c → app/a` under `app/src`, plus `app/lib/d.ts`
/// importing `a` and an external package.
fn write_graph(dir: &TempDir) -> PathBuf {
    let module = |id: &str, path: &str, imports: serde_json::Value| {
        json!({ "id": id, "name": id.rsplit('/').next(), "path": path, "imports": imports })
    };
    let graph = json!({
        "packages": [{
            "id": "app",
            "name": "app",
            "path": "app",
            "modules": [
                module("app/a", "app/src/a.ts", json!([{ "specifier": "./b", "resolved": "app/b" }])),
                module("app/b", "app/src/b.ts", json!([{ "specifier": "./c", "resolved": "app/c" }])),
                module("app/c", "app/src/c.ts", json!([{ "specifier": "./a", "resolved": "app/a" }])),
                module("app/d", "app/lib/d.ts", json!([
                    { "specifier": "../src/a", "resolved": "app/a" },
                    { "specifier": "lodash" }
                ])),
            ],
        }],
        "relationships": [
            { "source": "app/d", "target": "app/gone" }
        ]
    });
    let path = dir.path().join("graph.json");
    std::fs::write(&path, serde_json::to_string_pretty(&graph).unwrap()).unwrap();
    path
}

fn write_preferences(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("trellis.toml");
    std::fs::write(&path, text).unwrap();
    path
}

fn build(graph: &PathBuf, prefs: &Preferences) -> ViewSnapshot {
    let raw = load_raw_graph(graph).unwrap();
    let options = BuildOptions::from_preferences(&prefs.view).unwrap();
    GraphViewBuilder::new(options).build(&raw)
}

fn assert_edges_are_live(snapshot: &ViewSnapshot) {
    let ids: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &snapshot.edges {
        assert!(ids.contains(edge.source.as_str()), "dangling source {}", edge.id);
        assert!(ids.contains(edge.target.as_str()), "dangling target {}", edge.id);
    }
}

#[test]
fn cycle_preferences_collapse_the_import_loop() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(&dir);
    let prefs = Preferences::load(Some(&write_preferences(
        &dir,
        "[view]\ncluster_folders = true\ncollapse_cycles = true\n",
    )))
    .unwrap();
    assert_eq!(prefs.view.mode(), ViewMode::CycleGroups);

    let snapshot = build(&graph, &prefs);
    assert_eq!(snapshot.cycles.len(), 1);
    let group = &snapshot.cycles[0];
    assert_eq!(group.id, "scc:app/a,app/b,app/c");
    assert_eq!(group.label, "Cycle(3)");
    assert!(snapshot.nodes.iter().all(|n| !n.id.starts_with("folder:")));
    assert!(snapshot.edges.iter().any(|e| e.source == "app/d" && e.target == group.id));
    assert_edges_are_live(&snapshot);
}

#[test]
fn collapsed_folder_lifts_incoming_edges() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(&dir);
    let prefs = Preferences::load(Some(&write_preferences(
        &dir,
        "[view]\ncollapsed_folders = [\"folder:app:src\"]\n",
    )))
    .unwrap();

    let snapshot = build(&graph, &prefs);
    let folder = snapshot
        .nodes
        .iter()
        .find(|n| n.id == "folder:app:src")
        .expect("folder node");
    assert!(folder.data.is_collapsed);
    assert_eq!(folder.data.child_count, Some(3));
    assert!(snapshot.nodes.iter().all(|n| !["app/a", "app/b", "app/c"].contains(&n.id.as_str())));

    let edge_ids: Vec<&str> = snapshot.edges.iter().map(|e| e.id.as_str()).collect();
    assert!(edge_ids.contains(&"app/d|folder:app:src|import"));
    assert_edges_are_live(&snapshot);

    let d = snapshot.nodes.iter().find(|n| n.id == "app/d").unwrap();
    let diagnostics = d.data.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostics.external_dependencies, vec!["lodash"]);
    assert!(!diagnostics.orphan_global);
}

#[tokio::test]
async fn pipeline_lays_out_and_virtualizes() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(&dir);
    let prefs = Preferences::load(Some(&write_preferences(
        &dir,
        "[virtualization]\nthreshold = 0\nmin_frame_gap_ms = 0\n",
    )))
    .unwrap();
    let snapshot = build(&graph, &prefs);

    let mut store = GraphStore::new();
    store.replace_nodes(snapshot.nodes.clone(), ChangeOrigin::Builder);
    store.replace_edges(snapshot.edges.clone(), ChangeOrigin::Builder);
    let store = store.shared();

    let container = Size::new(1600.0, 900.0);
    let mut virtualizer = EdgeVirtualizer::new(prefs.virtualization.clone());
    let surface = Arc::new(HeadlessSurface::new(&prefs.layout, Some(container)));
    let orchestrator = LayoutOrchestrator::new(store.clone(), Arc::new(ThreadLayoutWorker::default()), surface.clone())
        .with_gate(Arc::new(virtualizer.gate()));

    let outcome = orchestrator.initialize(prefs.layout.clone()).await;
    assert!(matches!(outcome, LayoutOutcome::Computed { version: 1, .. }), "{outcome:?}");
    assert!(store.read().await.nodes().iter().all(|n| n.size.is_some()));
    assert_eq!(
        orchestrator.layout(prefs.layout.clone()).await,
        LayoutOutcome::CacheHit { version: 2 }
    );

    virtualizer.set_container_size(Some(container));

    // looking far away from the graph shows nothing
    virtualizer.set_viewport(Viewport { x: 1.0e6, y: 1.0e6, zoom: 1.0 });
    {
        let mut store = store.write().await;
        virtualizer.on_frame(Instant::now(), &mut store);
        assert!(store.edges().iter().all(|e| e.hidden));
    }

    // fit-to-view shows everything again
    virtualizer.set_viewport(surface.viewport());
    let mut store = store.write().await;
    virtualizer.on_frame(Instant::now(), &mut store);
    assert!(store.edges().iter().all(|e| !e.hidden));
    assert_eq!(virtualizer.state().stats.virtualized, 0);
}

#[test]
fn preferences_round_trip_through_toml() {
    let dir = TempDir::new().unwrap();
    let path = write_preferences(
        &dir,
        r#"
[view]
node_kinds = ["package", "module"]

[layout]
direction = "right"
two_pass = false

[layout.offsets]
"app/a" = { x = 12.0, y = 0.0 }
"#,
    );
    let prefs = Preferences::load(Some(&path)).unwrap();
    assert_eq!(prefs.layout.direction, LayoutDirection::Right);
    assert!(!prefs.layout.two_pass);
    assert_eq!(prefs.layout.offsets["app/a"].x, 12.0);
    assert_eq!(prefs.view.node_kinds, vec![NodeKind::Package, NodeKind::Module]);
    assert_eq!(prefs.virtualization.threshold, 200);

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        Preferences::load(Some(&missing)),
        Err(CoreError::PreferencesNotFound(_))
    ));
}
