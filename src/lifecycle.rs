//! Screen-session lifecycle.
//!
//! A session is open until its owner tears it down. Loads still in flight at
//! that point observe the teardown and drop their results without touching
//! the store or reporting an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

pub struct SessionLifecycle {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Tear the session down. Later calls are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session closed");
            self.notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Create a handle for sharing
    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            closed: Arc::clone(&self.closed),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight handle for checking teardown state
#[derive(Clone)]
pub struct LifecycleHandle {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl LifecycleHandle {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the session is torn down.
    pub async fn closed(&self) {
        // Subscribe before checking the flag so a close() between the
        // check and the await is not lost.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}
