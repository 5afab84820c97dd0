//! Router lifecycle state.

/// The router's coarse lifecycle, gating which operations are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed but `init()` has not yet run.
    Uninitialized,
    /// `init()` has run; `start()` has not yet been called.
    Initialized,
    /// Running: the receive pipeline and periodic tasks are active.
    Started,
    /// Temporarily suspended: `send` is rejected and the receive pipeline
    /// drops every frame, but peer state is preserved.
    Paused,
    /// Permanently stopped; periodic tasks exit on their next tick.
    Stopped,
}
