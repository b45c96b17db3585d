//! Registry of the steps a host program makes available to the engine.

use provisio_core::{Step, StepName, WorkflowError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Steps keyed by name.
///
/// Built once at start-up with [`StepRegistry::builder`]; the engine then
/// looks steps up by the names its workflow configuration lists.
pub struct StepRegistry {
    steps: HashMap<StepName, Arc<dyn Step>>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

impl StepRegistry {
    /// Creates a new registry builder.
    pub fn builder() -> StepRegistryBuilder {
        StepRegistryBuilder::new()
    }

    /// Returns the step registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    /// Returns `true` if a step with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Returns all registered names in sorted order.
    pub fn names(&self) -> Vec<StepName> {
        let mut names: Vec<StepName> = self.steps.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns `(name, description)` pairs in name order.
    pub fn describe(&self) -> Vec<(StepName, String)> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let description = self.steps.get(&name)?.description().to_string();
                Some((name, description))
            })
            .collect()
    }

    /// Returns the number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for constructing a [`StepRegistry`].
#[derive(Default)]
pub struct StepRegistryBuilder {
    steps: Vec<Arc<dyn Step>>,
}

impl StepRegistryBuilder {
    /// Creates a new empty builder.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Adds a step under its own name.
    pub fn register<S: Step + 'static>(self, step: S) -> Self {
        self.register_shared(Arc::new(step))
    }

    /// Adds an already shared step.
    pub fn register_shared(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Builds the registry.
    ///
    /// Fails if two steps share a name or a step depends on a name that
    /// was never registered.
    pub fn build(self) -> Result<StepRegistry, WorkflowError> {
        let mut steps = HashMap::with_capacity(self.steps.len());
        for step in self.steps {
            let name = step.name();
            if steps.contains_key(&name) {
                return Err(WorkflowError::DuplicateStep(name));
            }
            debug!("registered step {}", name);
            steps.insert(name, step);
        }

        for step in steps.values() {
            if let Some(missing) = step
                .depends()
                .into_iter()
                .find(|dep| !steps.contains_key(dep))
            {
                return Err(WorkflowError::StepNotFound(missing));
            }
        }

        Ok(StepRegistry { steps })
    }
}
