//! Run cancellation.
//!
//! Ctrl+C must not cost the operator their download progress: in-flight
//! transfers finish their current attempt, the manifest gets its final
//! flush, and the process reports an interrupted exit code. The
//! coordinator here carries that contract across the crate: `main`
//! registers one instance and trips it from the signal handler, workers
//! poll it between resources, and retry backoff sleeps race it via
//! `tokio::select!` so a cancelled run never sits out a long delay.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

static GLOBAL_SHUTDOWN: OnceCell<SharedShutdown> = OnceCell::new();

/// Register a process-wide shutdown handle. Subsystems constructed without
/// an explicit handle pick this one up lazily. First registration wins.
pub fn set_global_shutdown(handle: SharedShutdown) {
    let _ = GLOBAL_SHUTDOWN.set(handle);
}

/// The registered process-wide shutdown handle, if any.
pub fn get_global_shutdown() -> Option<SharedShutdown> {
    GLOBAL_SHUTDOWN.get().cloned()
}

/// Cancellation flag plus wakeup for tasks parked in sleeps.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new coordinator behind an [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Waiters are woken once; repeat calls are no-ops.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Park until shutdown is requested; returns at once if it already was.
    pub async fn wait_for_shutdown(&self) {
        if self.is_shutdown_requested() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_requested());
        coordinator.request_shutdown();
        coordinator.request_shutdown();
        assert!(coordinator.is_shutdown_requested());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_requested() {
        let coordinator = ShutdownCoordinator::shared();
        coordinator.request_shutdown();
        coordinator.wait_for_shutdown().await;
    }

    #[tokio::test]
    async fn waiters_are_woken_by_a_request() {
        let coordinator = ShutdownCoordinator::shared();
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_for_shutdown().await })
        };
        tokio::task::yield_now().await;
        coordinator.request_shutdown();
        waiter.await.unwrap();
    }
}
