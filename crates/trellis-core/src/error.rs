//! Error types for fallible core operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading inputs. Graph transforms never fail; they
/// drop malformed entries instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("preferences file not found: {}", .0.display())]
    PreferencesNotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid preferences: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid test-file pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
