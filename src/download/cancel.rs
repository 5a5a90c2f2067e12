//! Cooperative cancellation handle shared between the signal listener and the
//! batch.
//!
//! The handle only knows "request cancellation" and "is cancellation
//! requested"; it is not tied to any OS signal. The engine observes it between
//! chunks of an in-flight transfer, during retry pauses, and between files.
//! A forced second-stage exit is the host process's business, not the
//! handle's.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Clonable cancellation flag.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    /// Creates a handle with cancellation not yet requested.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Requests cancellation. Returns `true` if this call was the first request.
    pub fn request(&self) -> bool {
        let already = self.state.send_replace(true);
        if !already {
            debug!("cancellation requested");
        }
        !already
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on a request.
        let _ = receiver.wait_for(|requested| *requested).await;
    }
}
