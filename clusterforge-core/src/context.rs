//! Request-scoped cancellation and deadlines
//!
//! Every lifecycle operation runs under an [`OperationContext`]. The context
//! combines a cancellation token (caller disconnect, process shutdown) with an
//! absolute deadline; whichever fires first interrupts the running call.

use clusterforge_common::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Context driven by an external cancellation token, with no deadline
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Context that is never cancelled externally
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Derive a child whose deadline is the shorter of the current one and `timeout` from now
    ///
    /// Cancelling the parent cancels the child; cancelling the child leaves the parent alone.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the context is already done
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::canceled(operation));
        }
        if self.is_expired() {
            return Err(Error::timeout(operation));
        }
        Ok(())
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::canceled(operation)),
            _ = self.expired() => Err(Error::timeout(operation)),
            result = fut => result,
        }
    }

    /// Sleep for `duration`, waking early with an error on cancellation or deadline
    pub async fn sleep(&self, operation: &str, duration: Duration) -> Result<()> {
        self.run(operation, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterforge_common::ErrorCode;

    #[tokio::test(start_paused = true)]
    async fn test_run_completes() {
        let ctx = OperationContext::background().with_timeout(Duration::from_secs(5));
        let value = ctx.run("op", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timeout() {
        let ctx = OperationContext::background().with_timeout(Duration::from_secs(1));
        let err = ctx
            .run("op", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_yields_canceled() {
        let root = OperationContext::background();
        let ctx = root.with_timeout(Duration::from_secs(600));
        let handle = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.sleep("op", Duration::from_secs(300)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        root.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_keeps_shorter_deadline() {
        let outer = OperationContext::background().with_timeout(Duration::from_secs(10));
        let inner = outer.with_timeout(Duration::from_secs(100));
        assert_eq!(inner.deadline(), outer.deadline());

        let tighter = outer.with_timeout(Duration::from_secs(1));
        assert!(tighter.deadline().unwrap() < outer.deadline().unwrap());
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_parent() {
        let parent = OperationContext::background();
        let child = parent.with_timeout(Duration::from_secs(5));
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(parent.check("op").is_ok());
    }
}
