//! In-memory compute gateway.
//!
//! Keeps a set of instances in process, records every call made against
//! it and can be told to fail. Clones share state, so a test can hand a
//! clone to a step and inspect the original afterwards.

use super::{ComputeGateway, GatewayError, GatewayFactory, Instance, TagFilter};
use async_trait::async_trait;
use provisio_core::{AwsConfig, Context};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call received by an [`InMemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Describe(TagFilter),
    Terminate(Vec<String>),
    CancelSpot(Vec<String>),
}

#[derive(Debug, Clone)]
enum Fault {
    Always(GatewayError),
    Times(u32, GatewayError),
}

#[derive(Debug, Default)]
struct State {
    instances: Vec<Instance>,
    terminated: BTreeSet<String>,
    cancelled_spot_requests: BTreeSet<String>,
    calls: Vec<Call>,
    describe_fault: Option<Fault>,
    terminate_fault: Option<Fault>,
    cancel_spot_fault: Option<Fault>,
    latency: Duration,
    terminate_latency: Option<Duration>,
}

/// Takes the next injected error, if any, consuming one use of a
/// counted fault.
fn next_fault(slot: &mut Option<Fault>) -> Option<GatewayError> {
    match slot.take() {
        None => None,
        Some(Fault::Always(e)) => {
            *slot = Some(Fault::Always(e.clone()));
            Some(e)
        }
        Some(Fault::Times(0, _)) => None,
        Some(Fault::Times(n, e)) => {
            *slot = Some(Fault::Times(n - 1, e.clone()));
            Some(e)
        }
    }
}

/// Process-local [`ComputeGateway`] with call recording and fault injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<State>>,
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway holding the given instances.
    pub fn with_instances(instances: impl IntoIterator<Item = Instance>) -> Self {
        let gateway = Self::new();
        gateway.state().instances.extend(instances);
        gateway
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an instance.
    pub fn insert(&self, instance: Instance) {
        self.state().instances.push(instance);
    }

    /// Delays every call by `latency`, observing the caller's context.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Delays terminate calls only, overriding [`set_latency`](Self::set_latency).
    pub fn set_terminate_latency(&self, latency: Duration) {
        self.state().terminate_latency = Some(latency);
    }

    /// Makes every describe call fail.
    pub fn fail_describe(&self, error: GatewayError) {
        self.state().describe_fault = Some(Fault::Always(error));
    }

    /// Makes every terminate call fail.
    pub fn fail_terminate(&self, error: GatewayError) {
        self.state().terminate_fault = Some(Fault::Always(error));
    }

    /// Makes the next `times` terminate calls fail.
    pub fn fail_terminate_times(&self, times: u32, error: GatewayError) {
        self.state().terminate_fault = Some(Fault::Times(times, error));
    }

    /// Makes every spot cancellation call fail.
    pub fn fail_cancel_spot(&self, error: GatewayError) {
        self.state().cancel_spot_fault = Some(Fault::Always(error));
    }

    /// Returns every call received, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Returns the id lists of all terminate calls.
    pub fn terminate_calls(&self) -> Vec<Vec<String>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Terminate(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the id lists of all spot cancellation calls.
    pub fn cancel_spot_calls(&self) -> Vec<Vec<String>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::CancelSpot(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if the instance has been terminated.
    pub fn is_terminated(&self, instance_id: &str) -> bool {
        self.state().terminated.contains(instance_id)
    }

    /// Returns the spot requests cancelled so far.
    pub fn cancelled_spot_requests(&self) -> Vec<String> {
        self.state().cancelled_spot_requests.iter().cloned().collect()
    }

    /// Returns a factory handing out clones of this gateway.
    ///
    /// The factory rejects accounts without an access key, the way a real
    /// provider client refuses to sign requests.
    pub fn factory(&self) -> impl GatewayFactory + 'static {
        let gateway = self.clone();
        move |cfg: &AwsConfig| -> Result<Box<dyn ComputeGateway>, GatewayError> {
            if !cfg.has_credentials() {
                return Err(GatewayError::Credentials(
                    "access key id and secret are required".to_string(),
                ));
            }
            Ok(Box::new(gateway.clone()))
        }
    }

    async fn delay(&self, ctx: &Context, terminating: bool) -> Result<(), GatewayError> {
        ctx.check()?;
        let latency = {
            let state = self.state();
            match state.terminate_latency {
                Some(latency) if terminating => latency,
                _ => state.latency,
            }
        };
        if !latency.is_zero() {
            ctx.sleep(latency).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeGateway for InMemoryGateway {
    async fn describe_instances(
        &self,
        ctx: &Context,
        filter: &TagFilter,
    ) -> Result<Vec<Instance>, GatewayError> {
        self.state().calls.push(Call::Describe(filter.clone()));
        self.delay(ctx, false).await?;

        let mut state = self.state();
        if let Some(e) = next_fault(&mut state.describe_fault) {
            return Err(e);
        }
        Ok(state
            .instances
            .iter()
            .filter(|i| !state.terminated.contains(&i.id) && filter.matches(i))
            .cloned()
            .collect())
    }

    async fn terminate_instances(
        &self,
        ctx: &Context,
        instance_ids: &[String],
    ) -> Result<(), GatewayError> {
        self.state().calls.push(Call::Terminate(instance_ids.to_vec()));
        self.delay(ctx, true).await?;

        let mut state = self.state();
        if let Some(e) = next_fault(&mut state.terminate_fault) {
            return Err(e);
        }
        if let Some(unknown) = instance_ids
            .iter()
            .find(|id| !state.instances.iter().any(|i| &i.id == *id))
        {
            return Err(GatewayError::api(
                "InvalidInstanceID.NotFound",
                format!("The instance ID '{}' does not exist", unknown),
            ));
        }
        state.terminated.extend(instance_ids.iter().cloned());
        Ok(())
    }

    async fn cancel_spot_requests(
        &self,
        ctx: &Context,
        request_ids: &[String],
    ) -> Result<(), GatewayError> {
        self.state().calls.push(Call::CancelSpot(request_ids.to_vec()));
        self.delay(ctx, false).await?;

        let mut state = self.state();
        if let Some(e) = next_fault(&mut state.cancel_spot_fault) {
            return Err(e);
        }
        state
            .cancelled_spot_requests
            .extend(request_ids.iter().cloned());
        Ok(())
    }
}
