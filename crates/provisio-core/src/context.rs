//! Cancellation-aware execution context for step runs.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Reason a guarded call did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The run was cancelled by the caller.
    Cancelled,
    /// The run's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupted::Cancelled => write!(f, "context cancelled"),
            Interrupted::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl std::error::Error for Interrupted {}

/// Execution context supplied by the engine to a step run.
///
/// Carries a cancellation token and an optional deadline. Remote calls
/// wrap their futures in [`Context::guard`] so that an in-flight call is
/// dropped as soon as the run is cancelled or runs out of time.
///
/// # Examples
///
/// ```
/// use provisio_core::{Context, Interrupted};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let ctx = Context::new().with_timeout(Duration::from_secs(5));
/// assert_eq!(ctx.guard(async { 7 }).await, Ok(7));
///
/// ctx.cancel();
/// assert_eq!(ctx.guard(async { 7 }).await, Err(Interrupted::Cancelled));
/// # });
/// ```
#[derive(Clone)]
pub struct Context {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    started_at: Instant,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context with no deadline.
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Uses the given token, typically a child of the engine's token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the deadline to `timeout` from now. A timeout too large to
    /// represent, such as `Duration::MAX`, leaves the context without one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns a context sharing this one's deadline whose token is a
    /// child of this one's. Cancelling the child leaves the parent running.
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
            started_at: Instant::now(),
        }
    }

    /// Cancels the context and every child derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns `true` if the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the underlying cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns the time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Checks whether the context is still live without awaiting anything.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.remaining() {
            Some(left) if left.is_zero() => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Runs `fut` until it completes, the context is cancelled, or the
    /// deadline passes, whichever happens first.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        self.check()?;

        let deadline = async {
            match self.remaining() {
                Some(left) => tokio::time::sleep(left).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            value = fut => Ok(value),
        }
    }

    /// Sleeps for `duration` unless the context ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.guard(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_guard_completes() {
        let ctx = Context::new();
        let value = assert_ok!(ctx.guard(async { "done" }).await);
        assert_eq!(value, "done");
    }

    #[tokio::test]
    async fn test_guard_cancelled_before_start() {
        let ctx = Context::new();
        ctx.cancel();
        let err = assert_err!(ctx.guard(async { 1 }).await);
        assert_eq!(err, Interrupted::Cancelled);
    }

    #[tokio::test]
    async fn test_guard_cancelled_mid_call() {
        let ctx = Context::new();
        let token = ctx.token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = ctx.sleep(Duration::from_secs(10)).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn test_guard_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let result = ctx.sleep(Duration::from_secs(10)).await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_unbounded_timeout_means_no_deadline() {
        let ctx = Context::new().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.remaining(), None);
        assert_ok!(ctx.check());
        assert_eq!(ctx.guard(async { 3 }).await, Ok(3));
    }

    #[test]
    fn test_expired_deadline_fails_check() {
        let ctx = Context::new().with_deadline(Instant::now());
        assert_eq!(ctx.check(), Err(Interrupted::DeadlineExceeded));
    }

    #[test]
    fn test_child_cancellation_is_one_way() {
        let parent = Context::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
