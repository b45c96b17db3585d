//! Workflow error types.

use crate::step::StepName;
use thiserror::Error;

/// Errors returned by steps and by step registration.
///
/// Step failures carry the name of the failing step and the text of the
/// underlying cause, so the engine can report them without knowing which
/// provider produced them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// Credentials were rejected or the provider client could not be built.
    #[error("Authorization failed in step {step_name}: {details}")]
    Authorization {
        /// The name of the step that failed.
        step_name: StepName,
        /// Details about the failure.
        details: String,
    },

    /// Looking up the node's provider resources failed.
    #[error("Failed to look up node {node} in step {step_name}: {details}")]
    Lookup {
        /// The name of the step that failed.
        step_name: StepName,
        /// The logical node that was looked up.
        node: String,
        /// Details about the failure.
        details: String,
    },

    /// The provider refused or failed to terminate instances.
    #[error("{step_name} terminate instance: {details}")]
    Termination {
        /// The name of the step that failed.
        step_name: StepName,
        /// Instance ids the terminate request covered.
        instance_ids: Vec<String>,
        /// Details about the failure.
        details: String,
    },

    /// Any other step failure.
    #[error("Step failed: {step_name}, details: {details}")]
    StepError {
        /// The name of the step that failed.
        step_name: StepName,
        /// Details about the failure.
        details: String,
    },

    /// A referenced step was not registered.
    #[error("Step not found: {0}")]
    StepNotFound(StepName),

    /// Two steps were registered under the same name.
    #[error("Step registered twice: {0}")]
    DuplicateStep(StepName),

    /// The run configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Returns the step the error originated in, when there is one.
    pub fn step_name(&self) -> Option<&StepName> {
        match self {
            WorkflowError::Authorization { step_name, .. }
            | WorkflowError::Lookup { step_name, .. }
            | WorkflowError::Termination { step_name, .. }
            | WorkflowError::StepError { step_name, .. } => Some(step_name),
            WorkflowError::StepNotFound(_)
            | WorkflowError::DuplicateStep(_)
            | WorkflowError::Configuration(_) => None,
        }
    }
}
