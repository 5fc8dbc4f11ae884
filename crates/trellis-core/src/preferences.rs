//! Persisted user preferences, read-only to the core

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::geometry::{Point, Size};
use crate::model::{EdgeKind, NodeKind};

/// Default preferences file looked up in the working directory.
pub const PREFERENCES_FILE: &str = "trellis.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub view: ViewPreferences,
    pub layout: LayoutConfig,
    pub virtualization: VirtualizationConfig,
}

impl Preferences {
    /// Load preferences. An explicit path must exist; without one the
    /// default file is used when present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Path::new(PREFERENCES_FILE).to_path_buf(), false),
        };
        if !path.exists() {
            if required {
                return Err(CoreError::PreferencesNotFound(path));
            }
            tracing::debug!("no preferences file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| CoreError::Io {
            path: path.clone(),
            source,
        })?;
        let prefs = Self::from_toml_str(&text)?;
        tracing::info!("Loaded preferences from {}", path.display());
        Ok(prefs)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Neither grouping transform runs.
    Flat,
    FolderClusters,
    CycleGroups,
}

impl ViewMode {
    /// Cycle grouping takes precedence when both toggles are set.
    pub fn resolve(cluster_folders: bool, collapse_cycles: bool) -> Self {
        if collapse_cycles {
            if cluster_folders {
                tracing::warn!("folder clustering and cycle collapsing both enabled; using cycle groups");
            }
            ViewMode::CycleGroups
        } else if cluster_folders {
            ViewMode::FolderClusters
        } else {
            ViewMode::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewPreferences {
    pub cluster_folders: bool,
    pub collapse_cycles: bool,
    pub node_kinds: Vec<NodeKind>,
    pub edge_kinds: Vec<EdgeKind>,
    pub show_test_files: bool,
    pub collapsed_folders: Vec<String>,
    pub highway_routing: bool,
    pub highway_min_group: usize,
    pub test_patterns: Vec<String>,
}

impl ViewPreferences {
    pub fn mode(&self) -> ViewMode {
        ViewMode::resolve(self.cluster_folders, self.collapse_cycles)
    }
}

pub fn default_test_patterns() -> Vec<String> {
    [
        "**/*.test.*",
        "**/*.spec.*",
        "**/__tests__/**",
        "**/tests/**",
        "**/*_test.*",
        "**/test_*.*",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for ViewPreferences {
    fn default() -> Self {
        ViewPreferences {
            cluster_folders: true,
            collapse_cycles: false,
            node_kinds: NodeKind::ALL.to_vec(),
            edge_kinds: EdgeKind::ALL.to_vec(),
            show_test_files: true,
            collapsed_folders: Vec::new(),
            highway_routing: false,
            highway_min_group: 3,
            test_patterns: default_test_patterns(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    #[default]
    Down,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    pub node_spacing: f64,
    pub layer_spacing: f64,
    /// Inner padding of containers.
    pub padding: f64,
    /// Space reserved for a container's label.
    pub header_height: f64,
    pub node_size: Size,
    /// Re-measure containers and relayout once when they disagree.
    pub two_pass: bool,
    /// Manual per-node position offsets, applied after layout.
    pub offsets: BTreeMap<String, Point>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            direction: LayoutDirection::Down,
            node_spacing: 40.0,
            layer_spacing: 80.0,
            padding: 20.0,
            header_height: 32.0,
            node_size: Size::new(180.0, 48.0),
            two_pass: true,
            offsets: BTreeMap::new(),
        }
    }
}

impl LayoutConfig {
    /// Geometry-affecting settings, used in cache keys. Offsets are left out
    /// because they are applied on top of cached geometry.
    pub fn summary(&self) -> String {
        format!(
            "{:?}:{}:{}:{}:{}:{}x{}:{}",
            self.direction,
            self.node_spacing,
            self.layer_spacing,
            self.padding,
            self.header_height,
            self.node_size.width,
            self.node_size.height,
            self.two_pass
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualizationConfig {
    /// Edge count below which every edge is rendered.
    pub threshold: usize,
    /// Zoom below which only the highest-priority edges are kept.
    pub low_detail_zoom: f64,
    pub max_low_detail_edges: usize,
    pub min_frame_gap_ms: u64,
    /// Extra graph-space margin around the viewport.
    pub overscan: f64,
}

impl Default for VirtualizationConfig {
    fn default() -> Self {
        VirtualizationConfig {
            threshold: 200,
            low_detail_zoom: 0.45,
            max_low_detail_edges: 400,
            min_frame_gap_ms: 16,
            overscan: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let prefs = Preferences::from_toml_str(
            r#"
[view]
collapse_cycles = true
edge_kinds = ["import", "devDependency"]

[layout]
direction = "right"

[layout.offsets]
"pkg:a" = { x = 10.0, y = -4.0 }
"#,
        )
        .unwrap();
        assert_eq!(prefs.view.mode(), ViewMode::CycleGroups);
        assert_eq!(prefs.view.edge_kinds, vec![EdgeKind::Import, EdgeKind::DevDependency]);
        assert_eq!(prefs.view.node_kinds.len(), NodeKind::ALL.len());
        assert_eq!(prefs.layout.direction, LayoutDirection::Right);
        assert_eq!(prefs.layout.offsets["pkg:a"], Point::new(10.0, -4.0));
        assert_eq!(prefs.virtualization, VirtualizationConfig::default());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Preferences::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, CoreError::PreferencesNotFound(_)));
    }

    #[test]
    fn folder_mode_is_the_default() {
        assert_eq!(ViewPreferences::default().mode(), ViewMode::FolderClusters);
        assert_eq!(ViewMode::resolve(false, false), ViewMode::Flat);
        assert_eq!(ViewMode::resolve(true, true), ViewMode::CycleGroups);
    }

    #[test]
    fn summary_ignores_offsets() {
        let mut config = LayoutConfig::default();
        let before = config.summary();
        config.offsets.insert("n".into(), Point::new(1.0, 1.0));
        assert_eq!(config.summary(), before);
        config.node_spacing = 10.0;
        assert_ne!(config.summary(), before);
    }
}
