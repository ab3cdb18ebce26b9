use std::future::Future;
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken as InternalCancellationToken;

/// The caller asked to abort.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled by the caller")]
pub struct Cancelled;

/// CancellationToken wrapper for tokio_util::sync::CancellationToken for avoiding Dependency Hell
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: InternalCancellationToken,
}

impl CancellationToken {
    /// Creates a new CancellationToken in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a CancellationToken which will get cancelled whenever the current token gets cancelled.
    pub fn child_token(&self) -> CancellationToken {
        Self {
            inner: self.inner.child_token(),
        }
    }

    /// Cancel the [`CancellationToken`] and all child tokens which had been derived from it.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// Waits for `duration`, returning early with [`Cancelled`] if the token fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        select! {
            biased;
            _ = self.inner.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Drives `fut` to completion unless the token fires first.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        select! {
            biased;
            _ = self.inner.cancelled() => Err(Cancelled),
            v = fut => Ok(v),
        }
    }
}
