//! Signal-driven shutdown
//!
//! The coordinator owns the root cancellation token. Every operation context
//! handed out by [`ShutdownCoordinator::context`] is a child of it, so a
//! SIGINT/SIGTERM unblocks in-flight poll loops with a `Canceled` error.

use crate::context::OperationContext;
use std::io;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh operation context bound to the root token
    pub fn context(&self) -> OperationContext {
        OperationContext::new(self.root.child_token())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Initiate shutdown; later calls are no-ops
    pub fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }

        info!("Initiating shutdown, cancelling in-flight operations");
        self.root.cancel();
    }

    /// Resolve once shutdown has been initiated
    pub async fn cancelled(&self) {
        self.root.cancelled().await
    }

    /// Wait for a termination signal from the OS, then shut down
    pub async fn wait_for_signal(&self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = self.root.cancelled() => return Ok(()),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    res?;
                    info!("Received Ctrl+C");
                }
                _ = self.root.cancelled() => return Ok(()),
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Listen for signals in the background
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = coordinator.wait_for_signal().await {
                tracing::warn!(error = %e, "Failed to register signal handlers");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterforge_common::ErrorCode;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_cancels_contexts() {
        let coordinator = ShutdownCoordinator::new();
        let ctx = coordinator.context();

        assert!(!coordinator.is_shutting_down());
        assert!(!ctx.is_cancelled());

        coordinator.shutdown();
        coordinator.shutdown();

        assert!(coordinator.is_shutting_down());
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check("op").unwrap_err().code(), ErrorCode::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let coordinator = ShutdownCoordinator::new();
        let ctx = coordinator.context().with_timeout(Duration::from_secs(600));

        let handle = tokio::spawn(async move { ctx.sleep("wait", Duration::from_secs(120)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.shutdown();

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Canceled);
    }

    #[tokio::test]
    async fn test_listener_exits_on_manual_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let handle = coordinator.spawn_signal_listener();
        coordinator.shutdown();
        handle.await.unwrap();
    }
}
