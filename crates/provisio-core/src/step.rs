//! Step trait and related types.

use crate::config::Config;
use crate::context::Context;
use crate::error::WorkflowError;
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::io::Write;

/// Type-safe step name wrapper.
///
/// Step names are the keys the engine registers steps under and the
/// values steps list in [`Step::depends`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the step name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Sink for user-facing progress text.
///
/// The engine hands every step a writer; lines written here end up in
/// the operator's console or task log.
pub type Output = dyn Write + Send;

/// A unit of work in a provisioning workflow.
///
/// Steps are stateless between invocations: everything a step needs
/// arrives through the [`Context`] and the [`Config`] of the run.
///
/// # Examples
///
/// ```
/// use provisio_core::{Config, Context, Output, Step, StepName, WorkflowError};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct LabelNodeStep;
///
/// #[async_trait]
/// impl Step for LabelNodeStep {
///     fn name(&self) -> StepName {
///         StepName::new("label_node")
///     }
///
///     fn description(&self) -> &str {
///         "Labels the node"
///     }
///
///     async fn run(
///         &self,
///         _ctx: &Context,
///         out: &mut Output,
///         cfg: &Config,
///     ) -> Result<(), WorkflowError> {
///         let _ = writeln!(out, "labelling {}", cfg.node.name);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Returns the unique name the step is registered under.
    fn name(&self) -> StepName;

    /// Returns a short human-readable summary.
    fn description(&self) -> &str;

    /// Returns the names of steps that must complete before this one.
    fn depends(&self) -> Vec<StepName> {
        Vec::new()
    }

    /// Executes the step.
    async fn run(&self, ctx: &Context, out: &mut Output, cfg: &Config)
        -> Result<(), WorkflowError>;

    /// Compensates for [`Step::run`] when a later step of the same
    /// workflow fails. Defaults to doing nothing.
    async fn rollback(
        &self,
        _ctx: &Context,
        _out: &mut Output,
        _cfg: &Config,
    ) -> Result<(), WorkflowError> {
        Ok(())
    }
}
