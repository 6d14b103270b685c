//! Call context - cancellation and deadlines
//!
//! Every public catalog, session and store operation takes a [`Context`].
//! It is checked at entry and raced against at every suspension point, so a
//! cancelled caller stops waiting without disturbing shared state.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation token plus an optional deadline
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Build a context around an existing token
    pub fn from_token(token: CancellationToken) -> Self {
        Context {
            token,
            deadline: None,
        }
    }

    /// Derive a context whose deadline is `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context with the earlier of the current and the given deadline
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Context {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context; cancelling the child leaves the parent alone
    pub fn child(&self) -> Self {
        Context {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Return the context's error, if it is done
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Resolve once the context is cancelled or its deadline passes.
    ///
    /// Returns the matching error.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => Error::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_background_is_live() {
        assert!(Context::background().check().is_ok());
    }

    #[test]
    fn test_cancel_propagates_to_children_only() {
        let parent = Context::background();
        let child = parent.child();
        child.cancel();
        assert!(parent.check().is_ok());
        assert_eq!(child.check().unwrap_err().kind(), ErrorKind::Cancelled);

        let other = parent.child();
        parent.cancel();
        assert_eq!(other.check().unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        assert!(ctx.check().is_ok());
        let err = ctx.done().await;
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert!(ctx.check().is_err());
    }

    #[tokio::test]
    async fn test_run_returns_cancelled() {
        let ctx = Context::background();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move {
            waiter
                .run(async {
                    futures::future::pending::<()>().await;
                    Ok(())
                })
                .await
        });
        ctx.cancel();
        let out = handle.await.unwrap();
        assert!(out.unwrap_err().is_cancellation());
    }

    #[test]
    fn test_done_waits_for_cancel() {
        let ctx = Context::background();
        let mut done = tokio_test::task::spawn(ctx.done());
        tokio_test::assert_pending!(done.poll());

        ctx.cancel();
        assert!(done.is_woken());
        let err = tokio_test::assert_ready!(done.poll());
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
