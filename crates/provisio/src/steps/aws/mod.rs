//! Steps operating on AWS-hosted clusters.

mod delete_node;

pub use delete_node::{DeleteNodeStep, DELETE_NODE_STEP_NAME};

use crate::gateway::GatewayFactory;
use crate::registry::StepRegistryBuilder;
use std::sync::Arc;

/// Registers the AWS steps, all sharing one gateway factory.
pub fn register(
    builder: StepRegistryBuilder,
    gateways: Arc<dyn GatewayFactory>,
) -> StepRegistryBuilder {
    builder.register(DeleteNodeStep::from_factory(gateways))
}
