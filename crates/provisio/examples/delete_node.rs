//! Deletes a spot-backed node through the in-memory gateway.
//!
//! Run with `RUST_LOG=debug` to see the step's structured logs next to
//! its progress output.

use provisio::gateway::{InMemoryGateway, Instance, RetryPolicy, RetryingGateway};
use provisio::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const RUN_CONFIG: &str = r#"{
    "node": { "name": "worker-3", "region": "us-west-2" },
    "cluster": { "name": "demo" },
    "awsConfig": { "keyId": "AKIADEMO", "secret": "demo", "region": "us-west-2" }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cloud = InMemoryGateway::with_instances([
        Instance::new("i-0a1b")
            .with_node_name("worker-3")
            .with_spot_request("sir-77"),
        Instance::new("i-0c2d").with_node_name("worker-4"),
    ]);
    // The first terminate request gets throttled; the retrying gateway absorbs it.
    cloud.fail_terminate_times(1, GatewayError::Throttled("RequestLimitExceeded".into()));

    let connect = {
        let cloud = cloud.clone();
        move |cfg: &AwsConfig| -> Result<Box<dyn ComputeGateway>, GatewayError> {
            let gateway = cloud.factory().connect(cfg)?;
            Ok(Box::new(RetryingGateway::new(
                gateway,
                RetryPolicy::exponential(3, Duration::from_millis(200)),
            )))
        }
    };

    let registry = provisio::steps::aws::register(StepRegistry::builder(), Arc::new(connect)).build()?;
    for (name, description) in registry.describe() {
        println!("{}: {}", name, description);
    }

    let cfg: Config = serde_json::from_str(RUN_CONFIG)?;
    let step = registry
        .get(DELETE_NODE_STEP_NAME)
        .ok_or_else(|| WorkflowError::StepNotFound(StepName::new(DELETE_NODE_STEP_NAME)))?;

    let ctx = Context::new().with_timeout(Duration::from_secs(30));
    let mut out = std::io::stdout();

    match step.run(&ctx, &mut out, &cfg).await {
        Ok(()) => {
            println!("terminated: {}", cloud.is_terminated("i-0a1b"));
            println!("cancelled spot requests: {:?}", cloud.cancelled_spot_requests());
        }
        Err(error) => {
            eprintln!("Step failed: {}", error);
            step.rollback(&ctx, &mut out, &cfg).await?;
        }
    }

    Ok(())
}
