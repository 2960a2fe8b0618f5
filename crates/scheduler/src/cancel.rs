//! Cancellation tokens for in-flight render and merge work
//!
//! A superseded render or merge is an expected, frequent condition, so it is
//! signalled through a shared token that the worker polls cooperatively
//! rather than through an error path.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared flag for cooperative cancellation.
///
/// Clones observe the same underlying state, so the requester keeps one copy
/// and hands another to the worker. Workers poll `is_cancelled()` between
/// units of work and bail out early when it flips.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the token. Idempotent; visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel()` has been called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
