//! Diagnostics support.
//!
//! When the `tracing` feature is enabled, this module emits structured
//! events for control-block teardown, refused locks and signal dispatch.
//! Call sites are gated on the feature, so nothing here is compiled in
//! otherwise.

#[cfg(feature = "tracing")]
pub mod internal {
    use tracing::{span, Level};

    /// Log the start of an owned value's deleter.
    pub fn log_destroy_start(type_name: &str, weak: usize) {
        tracing::trace!(type_name, weak, "destroy_start");
    }

    /// Log the end of an owned value's deleter.
    pub fn log_destroy_end(type_name: &str, weak: usize) {
        tracing::trace!(type_name, weak, "destroy_end");
    }

    /// Log the release of a control block allocation.
    pub fn log_block_dealloc(type_name: &str) {
        tracing::trace!(type_name, "block_dealloc");
    }

    /// Log a weak reference that could not be locked.
    pub fn log_lock_denied(reason: &'static str) {
        tracing::debug!(reason, "lock_denied");
    }

    /// Create a span covering one signal emission.
    pub fn trace_emit(listeners: usize, statics: usize) -> span::EnteredSpan {
        span!(Level::DEBUG, "signal_emit", listeners, statics).entered()
    }

    /// Log a listener registration.
    pub fn log_listener_registered(total: usize, is_static: bool) {
        tracing::debug!(total, is_static, "listener_registered");
    }

    /// Log expired listener entries removed from a signal.
    pub fn log_listeners_pruned(pruned: usize, remaining: usize) {
        if pruned > 0 {
            tracing::debug!(pruned, remaining, "listeners_pruned");
        }
    }

    /// Log a listener skipped because its handle was dropped mid-emission.
    pub fn log_listener_skipped() {
        tracing::debug!("listener_skipped");
    }
}
