//! Workflow steps for cluster provisioning.
//!
//! Steps implement the [`Step`] contract from `provisio-core`, reach the
//! cloud through a [`ComputeGateway`](gateway::ComputeGateway) and are
//! made available to the engine through a [`StepRegistry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use provisio::prelude::*;
//! use provisio::gateway::{InMemoryGateway, Instance};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = InMemoryGateway::with_instances([
//!         Instance::new("i-1").with_node_name("worker-3"),
//!     ]);
//!
//!     let registry = provisio::steps::aws::register(
//!         StepRegistry::builder(),
//!         Arc::new(gateway.factory()),
//!     )
//!     .build()
//!     .expect("valid registry");
//!
//!     let step = registry.get(DELETE_NODE_STEP_NAME).expect("registered");
//!     let mut cfg = Config::default();
//!     cfg.node.name = "worker-3".to_string();
//!     step.run(&Context::new(), &mut std::io::stdout(), &cfg)
//!         .await
//!         .expect("node deleted");
//! }
//! ```

pub mod gateway;
mod registry;
pub mod steps;

// Re-export core types
pub use provisio_core::*;

pub use registry::{StepRegistry, StepRegistryBuilder};
pub use steps::aws::{DeleteNodeStep, DELETE_NODE_STEP_NAME};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::gateway::{ComputeGateway, GatewayError, GatewayFactory};
    pub use crate::{
        AwsConfig, ClusterConfig, Config, Context, DeleteNodeStep, NodeConfig, Output, Step,
        StepName, StepRegistry, StepRegistryBuilder, WorkflowError, DELETE_NODE_STEP_NAME,
    };
}
