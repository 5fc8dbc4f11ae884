//! Layout worker protocol and the threaded worker
//!
//! Layout runs off the caller's task, reached only by message passing.
//! Requests carry the caller's version; the worker echoes it back and
//! never reorders or drops on its own, so stale detection stays with the
//! caller.

use std::sync::mpsc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use trellis_core::{GraphEdge, GraphNode, LayoutConfig};

use crate::engine::{LayeredEngine, LayoutEngine};
use crate::error::{LayoutError, Result};

#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub version: u64,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub config: LayoutConfig,
}

/// Nodes come back with `position` and `size` filled in.
#[derive(Debug, Clone)]
pub struct LayoutResponse {
    pub version: u64,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[async_trait]
pub trait LayoutWorker: Send + Sync {
    async fn compute(&self, request: LayoutRequest) -> Result<LayoutResponse>;
}

/// Internal message for the worker thread
struct WorkerRequest {
    request: LayoutRequest,
    reply: oneshot::Sender<Result<LayoutResponse>>,
}

/// Runs a [`LayoutEngine`] on a dedicated thread.
#[derive(Clone)]
pub struct ThreadLayoutWorker {
    sender: mpsc::Sender<WorkerRequest>,
}

impl ThreadLayoutWorker {
    pub fn spawn<E: LayoutEngine>(engine: E) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let spawned = std::thread::Builder::new()
            .name("trellis-layout".into())
            .spawn(move || Self::worker_thread(engine, receiver));
        if let Err(e) = spawned {
            // every compute() will report WorkerShutDown
            tracing::error!("Failed to start layout worker: {}", e);
        }
        Self { sender }
    }

    fn worker_thread<E: LayoutEngine>(mut engine: E, receiver: mpsc::Receiver<WorkerRequest>) {
        tracing::debug!("Layout worker started");
        while let Ok(WorkerRequest { request, reply }) = receiver.recv() {
            let version = request.version;
            let result = engine.layout(request);
            if reply.send(result).is_err() {
                tracing::debug!(version, "layout caller went away before the reply");
            }
        }
        tracing::debug!("Layout worker shutting down");
    }
}

impl Default for ThreadLayoutWorker {
    fn default() -> Self {
        Self::spawn(LayeredEngine)
    }
}

#[async_trait]
impl LayoutWorker for ThreadLayoutWorker {
    async fn compute(&self, request: LayoutRequest) -> Result<LayoutResponse> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(WorkerRequest { request, reply })
            .map_err(|_| LayoutError::WorkerShutDown)?;
        response.await.map_err(|_| LayoutError::WorkerDied)?
    }
}
