//! Retries for transient provider failures.
//!
//! Throttling and dropped connections are the gateway's problem, not the
//! step's: wrap a gateway in [`RetryingGateway`] and steps see either a
//! success or a failure that is worth reporting.

use super::{ComputeGateway, GatewayError, Instance, TagFilter};
use async_trait::async_trait;
use provisio_core::Context;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often and how fast a failed call is retried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Fail on the first error.
    #[default]
    None,
    /// Constant delay between attempts.
    Fixed {
        /// Retries after the first attempt.
        max_retries: u32,
        /// Delay before each retry.
        delay: Duration,
    },
    /// Delay grows by `multiplier` per retry, capped at `max_delay`.
    Exponential {
        /// Retries after the first attempt.
        max_retries: u32,
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Upper bound for any delay.
        max_delay: Duration,
        /// Growth factor per retry.
        multiplier: u32,
    },
}

/// Error returned when [`RetryPolicy`] parameters are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicyError(pub &'static str);

impl fmt::Display for RetryPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RetryPolicyError {}

impl RetryPolicy {
    /// Retries `max_retries` times with a constant delay.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed { max_retries, delay }
    }

    /// Doubling backoff capped at 20 seconds.
    pub fn exponential(max_retries: u32, initial_delay: Duration) -> Self {
        RetryPolicy::Exponential {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(20).max(initial_delay),
            multiplier: 2,
        }
    }

    /// Backoff with explicit bounds.
    pub fn exponential_backoff(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: u32,
    ) -> Result<Self, RetryPolicyError> {
        if !(1..=10).contains(&multiplier) {
            return Err(RetryPolicyError("multiplier must be between 1 and 10"));
        }
        if max_delay < initial_delay {
            return Err(RetryPolicyError("max_delay must be >= initial_delay"));
        }
        Ok(RetryPolicy::Exponential {
            max_retries,
            initial_delay,
            max_delay,
            multiplier,
        })
    }

    /// Returns the number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_retries, .. }
            | RetryPolicy::Exponential { max_retries, .. } => *max_retries,
        }
    }

    /// Returns the delay before retry number `retry` (zero-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => multiplier
                .checked_pow(retry)
                .and_then(|factor| initial_delay.checked_mul(factor))
                .map_or(*max_delay, |delay| delay.min(*max_delay)),
        }
    }
}

/// Gateway decorator retrying transient failures per a [`RetryPolicy`].
///
/// Permanent failures and interrupted calls are returned at once.
/// Waiting between attempts honours the run's context.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> fmt::Debug for RetryingGateway<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingGateway")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<G: ComputeGateway> RetryingGateway<G> {
    /// Wraps `inner`.
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retry<'a, T, F, Fut>(
        &'a self,
        ctx: &Context,
        operation: &str,
        call: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(&'a G) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let max_retries = self.policy.max_retries();
        let mut retry = 0;

        loop {
            match call(&self.inner).await {
                Err(e) if e.is_transient() && retry < max_retries => {
                    let delay = self.policy.delay_for_retry(retry);
                    warn!(
                        "{} failed: {}, retrying ({}/{}) in {:?}",
                        operation,
                        e,
                        retry + 1,
                        max_retries,
                        delay
                    );
                    ctx.sleep(delay).await?;
                    retry += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<G: ComputeGateway> ComputeGateway for RetryingGateway<G> {
    async fn describe_instances(
        &self,
        ctx: &Context,
        filter: &TagFilter,
    ) -> Result<Vec<Instance>, GatewayError> {
        self.with_retry(ctx, "describe instances", |gw| {
            gw.describe_instances(ctx, filter)
        })
        .await
    }

    async fn terminate_instances(
        &self,
        ctx: &Context,
        instance_ids: &[String],
    ) -> Result<(), GatewayError> {
        self.with_retry(ctx, "terminate instances", |gw| {
            gw.terminate_instances(ctx, instance_ids)
        })
        .await
    }

    async fn cancel_spot_requests(
        &self,
        ctx: &Context,
        request_ids: &[String],
    ) -> Result<(), GatewayError> {
        self.with_retry(ctx, "cancel spot requests", |gw| {
            gw.cancel_spot_requests(ctx, request_ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Call, InMemoryGateway};

    #[test]
    fn test_retry_policy_fixed() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_exponential_caps() {
        let policy = RetryPolicy::exponential_backoff(
            10,
            Duration::from_millis(100),
            Duration::from_millis(500),
            2,
        )
        .expect("valid policy");
        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(200), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_policy_validation() {
        let zero = RetryPolicy::exponential_backoff(
            3,
            Duration::from_millis(100),
            Duration::from_secs(10),
            0,
        );
        assert!(zero.is_err());

        let inverted = RetryPolicy::exponential_backoff(
            3,
            Duration::from_secs(10),
            Duration::from_millis(100),
            2,
        );
        assert_eq!(
            inverted,
            Err(RetryPolicyError("max_delay must be >= initial_delay"))
        );
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let inner = InMemoryGateway::with_instances([Instance::new("i-1")]);
        inner.fail_terminate_times(2, GatewayError::Throttled("RequestLimitExceeded".into()));
        let gateway =
            RetryingGateway::new(inner.clone(), RetryPolicy::fixed(3, Duration::from_millis(1)));

        let ids = vec!["i-1".to_string()];
        gateway
            .terminate_instances(&Context::new(), &ids)
            .await
            .expect("third attempt succeeds");

        assert_eq!(inner.terminate_calls().len(), 3);
        assert!(inner.is_terminated("i-1"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = InMemoryGateway::new();
        inner.fail_describe(GatewayError::Transport("connection reset".into()));
        let gateway =
            RetryingGateway::new(inner.clone(), RetryPolicy::fixed(2, Duration::from_millis(1)));

        let result = gateway
            .describe_instances(&Context::new(), &TagFilter::node_name("n"))
            .await;

        assert_eq!(
            result,
            Err(GatewayError::Transport("connection reset".into()))
        );
        let describes = inner
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Describe(_)))
            .count();
        assert_eq!(describes, 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let inner = InMemoryGateway::new();
        inner.fail_cancel_spot(GatewayError::api("InvalidSpotInstanceRequestID.NotFound", "gone"));
        let gateway =
            RetryingGateway::new(inner.clone(), RetryPolicy::fixed(5, Duration::from_millis(1)));

        let ids = vec!["sir-1".to_string()];
        let result = gateway.cancel_spot_requests(&Context::new(), &ids).await;

        assert!(matches!(result, Err(GatewayError::Api { .. })));
        assert_eq!(inner.cancel_spot_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_backoff() {
        let inner = InMemoryGateway::new();
        inner.fail_terminate(GatewayError::Throttled("slow down".into()));
        let gateway =
            RetryingGateway::new(inner.clone(), RetryPolicy::fixed(5, Duration::from_secs(60)));

        let ctx = Context::new();
        let token = ctx.token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let ids = vec!["i-1".to_string()];
        let result = gateway.terminate_instances(&ctx, &ids).await;

        assert_eq!(result, Err(GatewayError::Cancelled));
        assert_eq!(inner.terminate_calls().len(), 1);
    }
}
