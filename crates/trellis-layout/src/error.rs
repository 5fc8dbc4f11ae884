//! Error types for layout computation

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout worker is shut down")]
    WorkerShutDown,

    #[error("layout worker died before replying")]
    WorkerDied,

    #[error("layout engine failed: {0}")]
    Engine(String),

    #[error("rendering surface failed: {0}")]
    Surface(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
