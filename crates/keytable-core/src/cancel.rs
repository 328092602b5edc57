//! Cancellation token for detached background work.
//!
//! Cache refreshes run as detached tasks that outlive the request which
//! scheduled them. When a table shuts down, those tasks must be abandoned
//! rather than awaited; the token is how they find out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token for cooperative abandonment of background tasks.
///
/// The token can be cloned into any number of tasks. When `cancel()` is
/// called on any handle, every handle observes the cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Every handle sharing this token observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Create a handle sharing this token's state, for moving into a
    /// spawned task.
    pub fn child_token(&self) -> Self {
        Self {
            cancelled: self.cancelled.clone(),
        }
    }
}
