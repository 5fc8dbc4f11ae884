//! Suspend/resume handshake between layout and virtualization

/// Lets a layout transition stop viewport-driven work from reading a
/// viewport that is about to move.
pub trait TransitionGate: Send + Sync {
    fn suspend(&self);

    /// Lift the suspension and request an immediate recompute.
    fn resume(&self);
}

/// Gate that does nothing, for callers without virtualization.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGate;

impl TransitionGate for NoopGate {
    fn suspend(&self) {}

    fn resume(&self) {}
}
