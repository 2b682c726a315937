//! Bounded poll-wait
//!
//! A state-check function runs on a fixed interval until it reports a value,
//! the ceiling elapses, or the operation context is cancelled or expires.
//! Cancellation is checked on every iteration, not only at entry.

use crate::context::OperationContext;
use clusterforge_common::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Fixed poll cadence and ceiling for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl PollPolicy {
    pub const fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }
}

/// Wait for a newly created cluster to report a phase
pub const CREATE_POLL: PollPolicy =
    PollPolicy::new(Duration::from_secs(10), Duration::from_secs(120));

/// Wait for a deleted cluster to disappear
pub const DELETE_POLL: PollPolicy =
    PollPolicy::new(Duration::from_secs(10), Duration::from_secs(600));

/// How a wait ended without error
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    /// The check reported a value
    Satisfied(T),
    /// The ceiling elapsed first
    CeilingReached { checks: u32 },
}

/// Poll `check` until it yields `Some`
///
/// The first check runs immediately. Errors from `check` end the wait and are
/// returned as-is; cancellation yields `Canceled` and an expired context
/// deadline yields `Timeout`.
pub async fn poll_until<T, F, Fut>(
    ctx: &OperationContext,
    operation: &str,
    policy: PollPolicy,
    mut check: F,
) -> Result<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut checks = 0u32;

    loop {
        ctx.check(operation)?;

        checks += 1;
        if let Some(value) = ctx.run(operation, check()).await? {
            trace!(operation, checks, "Wait condition satisfied");
            return Ok(WaitOutcome::Satisfied(value));
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.ceiling {
            trace!(operation, checks, "Wait ceiling reached");
            return Ok(WaitOutcome::CeilingReached { checks });
        }

        let pause = policy.interval.min(policy.ceiling - elapsed);
        ctx.sleep(operation, pause).await?;
    }
}
