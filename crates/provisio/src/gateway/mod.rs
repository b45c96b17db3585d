//! Capability seam over a cloud provider's instance-management API.
//!
//! Steps depend on [`ComputeGateway`], never on a provider SDK. The
//! trait exposes only what node deletion needs: a tag lookup, a bulk
//! terminate and a bulk spot-request cancellation.

pub mod memory;
pub mod retry;

use async_trait::async_trait;
use provisio_core::{AwsConfig, Context, Interrupted};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use memory::{Call, InMemoryGateway};
pub use retry::{RetryPolicy, RetryPolicyError, RetryingGateway};

/// Tag key holding the logical node name on provider instances.
pub const TAG_NODE_NAME: &str = "Name";

/// Errors reported by a [`ComputeGateway`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// Credentials are missing or were rejected.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// The provider throttled the request.
    #[error("request throttled: {0}")]
    Throttled(String),

    /// The request did not reach the provider or the reply was lost.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider rejected the request.
    #[error("{code}: {message}")]
    Api {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },

    /// The run was cancelled while the call was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The run's deadline passed while the call was in flight.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl GatewayError {
    /// Builds an [`GatewayError::Api`] error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Throttled(_) | GatewayError::Transport(_))
    }
}

impl From<Interrupted> for GatewayError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => GatewayError::Cancelled,
            Interrupted::DeadlineExceeded => GatewayError::DeadlineExceeded,
        }
    }
}

/// A compute instance as seen through the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    /// Provider-assigned instance id.
    pub id: String,
    /// Instance tags.
    pub tags: BTreeMap<String, String>,
    /// Spot request that launched the instance, if any.
    pub spot_request_id: Option<String>,
}

impl Instance {
    /// Creates an untagged on-demand instance.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Tags the instance with a node name.
    pub fn with_node_name(self, name: impl Into<String>) -> Self {
        self.with_tag(TAG_NODE_NAME, name)
    }

    /// Associates the instance with a spot request.
    pub fn with_spot_request(mut self, id: impl Into<String>) -> Self {
        self.spot_request_id = Some(id.into());
        self
    }

    /// Returns the value of the node-name tag.
    pub fn node_name(&self) -> Option<&str> {
        self.tags.get(TAG_NODE_NAME).map(String::as_str)
    }
}

/// Matches instances carrying `key` with any of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub values: Vec<String>,
}

impl TagFilter {
    /// Creates a filter on a single tag value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: vec![value.into()],
        }
    }

    /// Filter on the node-name tag.
    pub fn node_name(name: impl Into<String>) -> Self {
        Self::new(TAG_NODE_NAME, name)
    }

    /// Returns `true` if the instance matches. Blank filter values match
    /// nothing, so an unnamed node never selects unnamed instances.
    pub fn matches(&self, instance: &Instance) -> bool {
        instance.tags.get(&self.key).is_some_and(|value| {
            self.values
                .iter()
                .any(|v| !v.trim().is_empty() && v == value)
        })
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag:{}={}", self.key, self.values.join(","))
    }
}

/// Instance management operations a step may call.
///
/// Every call takes the run's [`Context`]; implementations must abort
/// in-flight work when the context is cancelled or its deadline passes.
#[async_trait]
pub trait ComputeGateway: Send + Sync {
    /// Lists instances matching the filter in the configured account and region.
    async fn describe_instances(
        &self,
        ctx: &Context,
        filter: &TagFilter,
    ) -> Result<Vec<Instance>, GatewayError>;

    /// Requests termination of all given instances in one call.
    async fn terminate_instances(
        &self,
        ctx: &Context,
        instance_ids: &[String],
    ) -> Result<(), GatewayError>;

    /// Cancels all given spot requests in one call.
    async fn cancel_spot_requests(
        &self,
        ctx: &Context,
        request_ids: &[String],
    ) -> Result<(), GatewayError>;
}

#[async_trait]
impl<G: ComputeGateway + ?Sized> ComputeGateway for Box<G> {
    async fn describe_instances(
        &self,
        ctx: &Context,
        filter: &TagFilter,
    ) -> Result<Vec<Instance>, GatewayError> {
        (**self).describe_instances(ctx, filter).await
    }

    async fn terminate_instances(
        &self,
        ctx: &Context,
        instance_ids: &[String],
    ) -> Result<(), GatewayError> {
        (**self).terminate_instances(ctx, instance_ids).await
    }

    async fn cancel_spot_requests(
        &self,
        ctx: &Context,
        request_ids: &[String],
    ) -> Result<(), GatewayError> {
        (**self).cancel_spot_requests(ctx, request_ids).await
    }
}

/// Builds a gateway for one run from the account configuration.
pub trait GatewayFactory: Send + Sync {
    /// Connects to the provider with the given account.
    fn connect(&self, cfg: &AwsConfig) -> Result<Box<dyn ComputeGateway>, GatewayError>;
}

impl<F> GatewayFactory for F
where
    F: Fn(&AwsConfig) -> Result<Box<dyn ComputeGateway>, GatewayError> + Send + Sync,
{
    fn connect(&self, cfg: &AwsConfig) -> Result<Box<dyn ComputeGateway>, GatewayError> {
        self(cfg)
    }
}
