//! Trellis Viewport — frame-paced edge virtualization

pub mod scheduler;
pub mod virtualizer;


pub use scheduler::{FrameScheduler, SchedulerHandle};
pub use virtualizer::{EdgeVirtualizer, Signature, VirtualizationState, VirtualizationStats};
