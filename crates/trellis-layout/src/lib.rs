//! Trellis Layout — cached, versioned geometry computation

pub mod cache;
pub mod diff;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod surface;
pub mod worker;


pub use cache::{cache_key, entry_weight, LayoutCache, LayoutCacheEntry, MAX_ENTRIES, MAX_WEIGHT};
pub use diff::{ChangeTracker, GeometryChanges, GEOMETRY_TOLERANCE};
pub use engine::{LayeredEngine, LayoutEngine};
pub use error::{LayoutError, Result};
pub use orchestrator::{LayoutOrchestrator, LayoutOutcome, LayoutPhase, MEASURE_TOLERANCE};
pub use surface::{HeadlessSurface, RenderSurface};
pub use worker::{LayoutRequest, LayoutResponse, LayoutWorker, ThreadLayoutWorker};
pub use trellis_core::LayoutConfig;
