//! The stage contract and built-in stage implementations.
//!
//! A stage is a pure contract: given its resolved inputs it produces an
//! output value or fails. Stages never reach around their declared
//! inputs into the live context store.

mod advisor;
mod finder;
mod persist;
mod render;

pub use advisor::AdvisorStage;
pub use finder::FinderStage;
pub use persist::PersistStage;
pub use render::RenderStage;

use crate::context::{ContextSnapshot, RunIdentity};
use crate::core::StageOutcome;
use crate::errors::MissingKeyError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// The resolved inputs handed to one stage invocation.
///
/// Carries the values for the stage's declared input keys, the run
/// identity, a snapshot of the context store at invocation time (for
/// terminal stages that persist or render), and the ordered outputs
/// produced so far.
#[derive(Debug, Clone)]
pub struct StageInputs {
    stage: String,
    identity: RunIdentity,
    values: HashMap<String, serde_json::Value>,
    snapshot: ContextSnapshot,
    produced: Vec<(String, serde_json::Value)>,
}

impl StageInputs {
    /// Creates inputs for a stage invocation.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        identity: RunIdentity,
        values: HashMap<String, serde_json::Value>,
        snapshot: ContextSnapshot,
        produced: Vec<(String, serde_json::Value)>,
    ) -> Self {
        Self {
            stage: stage.into(),
            identity,
            values,
            snapshot,
            produced,
        }
    }

    /// The name of the stage being invoked.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The identity of the current run.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Looks up a resolved input value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Looks up a resolved input value, failing if absent.
    ///
    /// # Errors
    ///
    /// Returns `MissingKeyError` if the key was not resolved for this
    /// stage.
    pub fn require(&self, key: &str) -> Result<&serde_json::Value, MissingKeyError> {
        self.values.get(key).ok_or_else(|| MissingKeyError::new(key))
    }

    /// All resolved input values, by key.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, serde_json::Value> {
        &self.values
    }

    /// The context snapshot taken just before this invocation.
    #[must_use]
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// Ordered (stage name, output value) pairs produced so far.
    #[must_use]
    pub fn produced(&self) -> &[(String, serde_json::Value)] {
        &self.produced
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Executes the stage against its resolved inputs.
    async fn invoke(&self, inputs: &StageInputs) -> StageOutcome;
}

/// A closure-backed stage for tests and glue.
pub struct FnStage<F>
where
    F: Fn(&StageInputs) -> StageOutcome + Send + Sync,
{
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageInputs) -> StageOutcome + Send + Sync,
{
    /// Creates a new closure-backed stage.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageInputs) -> StageOutcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageInputs) -> StageOutcome + Send + Sync,
{
    async fn invoke(&self, inputs: &StageInputs) -> StageOutcome {
        (self.func)(inputs)
    }
}

#[cfg(test)]
pub(crate) fn test_inputs(
    stage: &str,
    values: HashMap<String, serde_json::Value>,
) -> StageInputs {
    let snapshot = ContextSnapshot::from_entries(
        values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    );
    StageInputs::new(
        stage,
        RunIdentity::new("test-pipeline"),
        values,
        snapshot,
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_stage_sees_its_inputs() {
        let stage = FnStage::new(|inputs: &StageInputs| match inputs.require("trigger") {
            Ok(v) => StageOutcome::value(v.clone()),
            Err(e) => StageOutcome::permanent(e.to_string()),
        });

        let mut values = HashMap::new();
        values.insert("trigger".to_string(), serde_json::json!("check pricing"));

        let outcome = stage.invoke(&test_inputs("Echo", values)).await;
        assert_eq!(
            outcome.into_value(),
            Some(serde_json::json!("check pricing"))
        );
    }

    #[tokio::test]
    async fn require_reports_missing_input() {
        let stage = FnStage::new(|inputs: &StageInputs| {
            match inputs.require("absent") {
                Ok(_) => StageOutcome::Done,
                Err(e) => StageOutcome::permanent(e.to_string()),
            }
        });

        let outcome = stage.invoke(&test_inputs("Echo", HashMap::new())).await;
        assert!(!outcome.is_success());
    }
}
