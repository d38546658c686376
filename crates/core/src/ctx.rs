//! Cancellation context for network-bound operations.
//!
//! Every call chain that may suspend on a network round trip takes a
//! [`FetchCtx`]. Cancellation is cooperative: the context is checked when a
//! fetch starts, and waits select on it rather than relying on the call
//! stack unwinding. A context optionally carries a deadline; hitting it maps
//! to [`RetrievalError::Timeout`], explicit cancellation maps to
//! [`RetrievalError::Cancelled`].

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{RetrievalError, RetrievalResult};

/// Cancellation token plus optional deadline, passed down every
/// network-bound call.
///
/// Cheap to clone; clones share the same cancellation state.
#[derive(Debug, Clone, Default)]
pub struct FetchCtx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl FetchCtx {
    /// Context with no deadline that is never cancelled unless
    /// [`FetchCtx::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Cancel the context. Every clone observes the cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context has been cancelled (deadline not considered).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drive `fut` to completion unless the context fires first.
    ///
    /// Checks cancellation and deadline up front, then races the future
    /// against both. The future is dropped when the context wins; callers
    /// that share work across waiters must drive that work on a detached
    /// task.
    pub async fn run<T, F>(&self, fut: F) -> RetrievalResult<T>
    where
        F: Future<Output = RetrievalResult<T>>,
    {
        if self.is_cancelled() {
            return Err(RetrievalError::Cancelled);
        }
        if self.is_expired() {
            return Err(RetrievalError::Timeout);
        }

        let expiry = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = self.cancel.cancelled() => Err(RetrievalError::Cancelled),
            _ = expiry => Err(RetrievalError::Timeout),
        }
    }
}
