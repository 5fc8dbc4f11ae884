//! Frame-paced scheduling
//!
//! Work is requested with [`SchedulerHandle::schedule`] and performed when
//! the host's per-frame callback calls [`FrameScheduler::poll`]. Requests
//! coalesce: any number of them between two polls yields one run, and runs
//! are at least `min_gap` apart unless a `resume()` asked for an immediate
//! one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use trellis_core::TransitionGate;

#[derive(Debug, Default)]
struct Signals {
    requested: AtomicBool,
    immediate: AtomicBool,
    /// Nesting depth; work is held while non-zero.
    suspended: AtomicUsize,
    disposed: AtomicBool,
}

/// Cloneable control side of a [`FrameScheduler`], safe to hand to other
/// tasks. Doubles as the layout transition gate.
#[derive(Debug, Clone, Default)]
pub struct SchedulerHandle {
    signals: Arc<Signals>,
}

impl SchedulerHandle {
    pub fn schedule(&self) {
        if !self.is_disposed() {
            self.signals.requested.store(true, Ordering::SeqCst);
        }
    }

    pub fn suspend(&self) {
        self.signals.suspended.fetch_add(1, Ordering::SeqCst);
    }

    /// Undo one `suspend()`. Leaving the last suspension requests an
    /// immediate run.
    pub fn resume(&self) {
        let previous = match self
            .signals
            .suspended
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| Some(depth.saturating_sub(1)))
        {
            Ok(depth) | Err(depth) => depth,
        };
        if previous <= 1 && !self.is_disposed() {
            self.signals.immediate.store(true, Ordering::SeqCst);
            self.signals.requested.store(true, Ordering::SeqCst);
        }
    }

    pub fn dispose(&self) {
        self.signals.disposed.store(true, Ordering::SeqCst);
        self.signals.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.signals.suspended.load(Ordering::SeqCst) > 0
    }

    pub fn is_disposed(&self) -> bool {
        self.signals.disposed.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.signals.requested.load(Ordering::SeqCst)
    }
}

impl TransitionGate for SchedulerHandle {
    fn suspend(&self) {
        SchedulerHandle::suspend(self);
    }

    fn resume(&self) {
        SchedulerHandle::resume(self);
    }
}

#[derive(Debug)]
pub struct FrameScheduler {
    handle: SchedulerHandle,
    min_gap: Duration,
    last_run: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(min_gap: Duration) -> Self {
        FrameScheduler {
            handle: SchedulerHandle::default(),
            min_gap,
            last_run: None,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn schedule(&self) {
        self.handle.schedule();
    }

    pub fn suspend(&self) {
        self.handle.suspend();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Called once per frame. Returns `true` when the scheduled work should
    /// run now, consuming the request.
    pub fn poll(&mut self, now: Instant) -> bool {
        let signals = &self.handle.signals;
        if self.handle.is_disposed() || self.handle.is_suspended() || !signals.requested.load(Ordering::SeqCst) {
            return false;
        }
        let immediate = signals.immediate.load(Ordering::SeqCst);
        if !immediate {
            if let Some(last) = self.last_run {
                if now.saturating_duration_since(last) < self.min_gap {
                    return false;
                }
            }
        }
        signals.requested.store(false, Ordering::SeqCst);
        signals.immediate.store(false, Ordering::SeqCst);
        self.last_run = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn requests_coalesce_into_one_run_per_gap() {
        let mut scheduler = FrameScheduler::new(ms(16));
        let start = Instant::now();
        assert!(!scheduler.poll(start));

        scheduler.schedule();
        scheduler.schedule();
        scheduler.schedule();
        assert!(scheduler.poll(start));
        assert!(!scheduler.poll(start + ms(1)));

        scheduler.schedule();
        assert!(!scheduler.poll(start + ms(5)));
        assert!(scheduler.poll(start + ms(16)));
    }

    #[test]
    fn suspension_holds_work_and_resume_runs_immediately() {
        let mut scheduler = FrameScheduler::new(ms(16));
        let handle = scheduler.handle();
        let start = Instant::now();
        scheduler.schedule();
        assert!(scheduler.poll(start));

        handle.suspend();
        handle.suspend();
        scheduler.schedule();
        assert!(!scheduler.poll(start + ms(100)));

        handle.resume();
        assert!(!scheduler.poll(start + ms(101)));
        handle.resume();
        assert!(scheduler.poll(start + ms(102)));
        assert!(!scheduler.poll(start + ms(102)));
    }

    #[test]
    fn resume_bypasses_the_frame_gap() {
        let mut scheduler = FrameScheduler::new(ms(16));
        let start = Instant::now();
        scheduler.schedule();
        assert!(scheduler.poll(start));
        scheduler.suspend();
        scheduler.resume();
        assert!(scheduler.poll(start + ms(1)));
    }

    #[test]
    fn disposed_scheduler_never_runs() {
        let mut scheduler = FrameScheduler::new(ms(0));
        scheduler.schedule();
        scheduler.dispose();
        scheduler.schedule();
        scheduler.resume();
        assert!(!scheduler.poll(Instant::now()));
    }

    #[test]
    fn unbalanced_resume_does_not_underflow() {
        let scheduler = FrameScheduler::new(ms(0));
        let handle = scheduler.handle();
        handle.resume();
        assert!(!handle.is_suspended());
        handle.suspend();
        assert!(handle.is_suspended());
    }
}
