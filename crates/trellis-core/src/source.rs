//! Reading raw graph documents produced by the ingestion stage

use std::path::Path;

use crate::error::{CoreError, Result};
use crate::model::RawGraph;

/// Load a raw graph from a JSON document.
pub fn load_raw_graph(path: &Path) -> Result<RawGraph> {
    let json = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let graph: RawGraph = serde_json::from_str(&json)?;
    tracing::debug!(
        packages = graph.packages.len(),
        relationships = graph.relationships.len(),
        "Raw graph loaded from: {}",
        path.display()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_graph;

    #[test]
    fn reads_serialized_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, serde_json::to_string(&sample_graph()).unwrap()).unwrap();
        assert_eq!(load_raw_graph(&path).unwrap(), sample_graph());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_raw_graph(Path::new("/no/such/graph.json")).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
