//! Removes a node's instances from AWS.

use crate::gateway::{ComputeGateway, GatewayFactory, Instance, TagFilter};
use async_trait::async_trait;
use provisio_core::{Config, Context, Output, Step, StepName, WorkflowError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Name the step is registered under.
pub const DELETE_NODE_STEP_NAME: &str = "aws_delete_node";

/// Terminates every instance tagged with the node's name and cancels the
/// spot requests behind them.
///
/// Deleting a node that has no instances left succeeds without touching
/// the provider, so the step can be re-run safely.
pub struct DeleteNodeStep {
    gateways: Arc<dyn GatewayFactory>,
}

impl fmt::Debug for DeleteNodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteNodeStep").finish_non_exhaustive()
    }
}

impl DeleteNodeStep {
    /// Creates the step; `gateways` builds a fresh gateway for every run.
    pub fn new(gateways: impl GatewayFactory + 'static) -> Self {
        Self {
            gateways: Arc::new(gateways),
        }
    }

    /// Creates the step from a shared factory.
    pub fn from_factory(gateways: Arc<dyn GatewayFactory>) -> Self {
        Self { gateways }
    }

    /// Reports a fatal error on the sink and hands it back.
    fn failed(&self, out: &mut Output, error: WorkflowError) -> WorkflowError {
        progress(out, format_args!("[{}] - failed: {}", self.name(), error));
        error
    }
}

/// Provider resources backing one logical node.
#[derive(Debug, Default, PartialEq, Eq)]
struct Targets {
    instance_ids: Vec<String>,
    spot_request_ids: Vec<String>,
}

impl Targets {
    fn collect(instances: &[Instance]) -> Self {
        let mut targets = Targets::default();
        for instance in instances {
            targets.instance_ids.push(instance.id.clone());
            if let Some(spot) = &instance.spot_request_id {
                targets.spot_request_ids.push(spot.clone());
            }
        }
        targets
    }
}

/// Writes a progress line to the caller's sink. A broken sink never
/// fails the step.
fn progress(out: &mut Output, line: fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{}", line) {
        debug!("dropping progress line: {}", e);
    }
}

#[async_trait]
impl Step for DeleteNodeStep {
    fn name(&self) -> StepName {
        StepName::new(DELETE_NODE_STEP_NAME)
    }

    fn description(&self) -> &str {
        "Deletes node in aws cluster"
    }

    async fn run(&self, ctx: &Context, out: &mut Output, cfg: &Config) -> Result<(), WorkflowError> {
        let node = cfg.node.name.as_str();
        info!("[{}] - deleting node {}", self.name(), node);

        let gateway = self.gateways.connect(&cfg.aws).map_err(|e| {
            error!("Error getting service {}", e);
            self.failed(
                out,
                WorkflowError::Authorization {
                    step_name: self.name(),
                    details: e.to_string(),
                },
            )
        })?;

        let filter = TagFilter::node_name(node);
        debug!("Get instance by name filter {}", filter);
        let instances = gateway
            .describe_instances(ctx, &filter)
            .await
            .map_err(|e| {
                self.failed(
                    out,
                    WorkflowError::Lookup {
                        step_name: self.name(),
                        node: node.to_string(),
                        details: e.to_string(),
                    },
                )
            })?;

        let targets = Targets::collect(&instances);
        debug!("Got {} instances for node {}", targets.instance_ids.len(), node);

        if targets.instance_ids.is_empty() {
            info!(
                "[{}] - node {} not found in cluster {}",
                self.name(),
                node,
                cfg.cluster.name
            );
            progress(
                out,
                format_args!("[{}] - node {} is already gone", self.name(), node),
            );
            return Ok(());
        }

        debug!(
            "Node to be deleted Name: {} AWS id: {:?}",
            node, targets.instance_ids
        );
        progress(
            out,
            format_args!(
                "[{}] - terminating {} for node {}",
                self.name(),
                targets.instance_ids.join(", "),
                node
            ),
        );
        gateway
            .terminate_instances(ctx, &targets.instance_ids)
            .await
            .map_err(|e| {
                self.failed(
                    out,
                    WorkflowError::Termination {
                        step_name: self.name(),
                        instance_ids: targets.instance_ids.clone(),
                        details: e.to_string(),
                    },
                )
            })?;

        if let Err(e) = gateway
            .cancel_spot_requests(ctx, &targets.spot_request_ids)
            .await
        {
            error!(
                "cancel spot requests {:?} caused {}",
                targets.spot_request_ids, e
            );
            progress(
                out,
                format_args!(
                    "[{}] - could not cancel spot requests {}: {}",
                    self.name(),
                    targets.spot_request_ids.join(", "),
                    e
                ),
            );
        }

        progress(out, format_args!("[{}] - finished successfully", self.name()));
        Ok(())
    }

    async fn rollback(
        &self,
        _ctx: &Context,
        _out: &mut Output,
        _cfg: &Config,
    ) -> Result<(), WorkflowError> {
        Ok(())
    }
}
