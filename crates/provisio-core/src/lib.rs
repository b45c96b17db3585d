//! Core traits and types for provisio workflow steps.
//!
//! Library authors depend on this crate to implement custom steps; the
//! `provisio` crate builds the step registry, compute gateways and the
//! bundled steps on top of it.
//!
//! # Core Types
//!
//! - [`Step`] - The contract every workflow step implements
//! - [`Context`] - Cancellation and deadline for a step run
//! - [`Config`] - Execution config: node, cluster and cloud account
//! - [`WorkflowError`] - Classified step and registration errors

mod config;
mod context;
mod error;
mod step;

pub use config::{AwsConfig, ClusterConfig, Config, NodeConfig};
pub use context::{Context, Interrupted};
pub use error::WorkflowError;
pub use step::{Output, Step, StepName};
pub use tokio_util::sync::CancellationToken;
