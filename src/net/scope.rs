//! Request-scoped cancellation.
//!
//! # Responsibilities
//! - Derive a cancellable lifetime for each streaming request
//! - Hand read-only views of it to background tasks
//! - Cancel exactly once, from whichever exit path gets there first
//!
//! # Design Decisions
//! - The scope is a child of the process shutdown token, so stopping the
//!   server tears down every in-flight stream as well
//! - The guard cancels on drop. axum drops the handler future (before the
//!   response is committed) or the response body (after) when the client
//!   goes away, which makes client disconnection cancel the scope without
//!   any extra wiring
//! - Cancellation is idempotent; observers treat it as "stop now", never as
//!   an error

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Read-only view of a request's lifetime, cloned into background tasks.
#[derive(Debug, Clone)]
pub struct RequestScope {
    token: CancellationToken,
}

impl RequestScope {
    /// Begin a request scope under `parent`.
    ///
    /// Returns the observable scope and the guard that owns cancellation.
    pub fn begin(parent: &CancellationToken) -> (RequestScope, ScopeGuard) {
        let token = parent.child_token();
        (
            RequestScope {
                token: token.clone(),
            },
            ScopeGuard { token },
        )
    }

    /// Begin a scope with no parent.
    pub fn detached() -> (RequestScope, ScopeGuard) {
        Self::begin(&CancellationToken::new())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope has been cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Owner of a request scope's cancellation.
///
/// Exactly one guard exists per scope. Cancelling it more than once, or
/// dropping it after an explicit cancel, is a no-op.
#[derive(Debug)]
pub struct ScopeGuard {
    token: CancellationToken,
}

impl ScopeGuard {
    /// Cancel the scope. Safe to call any number of times.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::trace!("Request scope cancelled");
        }
        self.token.cancel();
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_is_observed_by_clones() {
        let (scope, guard) = RequestScope::detached();
        let observer = scope.clone();
        let waiter = tokio::spawn(async move { observer.cancelled().await });

        assert!(!scope.is_cancelled());
        guard.cancel();

        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("observer should wake")
            .unwrap();
        assert!(scope.is_cancelled());
    }

    #[test]
    fn teardown_is_idempotent() {
        let (scope, guard) = RequestScope::detached();
        guard.cancel();
        guard.cancel();
        assert!(scope.is_cancelled());
        drop(guard);
        assert!(scope.is_cancelled());
    }

    #[test]
    fn dropping_guard_cancels() {
        let (scope, guard) = RequestScope::detached();
        drop(guard);
        assert!(scope.is_cancelled());
    }

    #[test]
    fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let (scope, _guard) = RequestScope::begin(&parent);
        parent.cancel();
        assert!(scope.is_cancelled());
    }

    #[test]
    fn child_cancellation_leaves_parent_running() {
        let parent = CancellationToken::new();
        let (_scope, guard) = RequestScope::begin(&parent);
        guard.cancel();
        assert!(!parent.is_cancelled());
    }
}
