//! Fluent construction of pipeline definitions.

use super::{PipelineDefinition, StageBinding};
use crate::errors::DefinitionError;
use crate::stages::Stage;
use crate::validation::ShapeValidator;
use std::sync::Arc;

/// Builds a `PipelineDefinition` stage by stage.
///
/// Validation happens once, in `build`; the builder itself accepts
/// anything.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    name: String,
    seed_keys: Vec<String>,
    stages: Vec<StageBinding>,
}

impl PipelineBuilder {
    /// Starts a builder for a named pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed_keys: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Declares a key present before the first stage runs.
    #[must_use]
    pub fn seed_key(mut self, key: impl Into<String>) -> Self {
        self.seed_keys.push(key.into());
        self
    }

    /// Appends a fully specified stage binding.
    #[must_use]
    pub fn binding(mut self, binding: StageBinding) -> Self {
        self.stages.push(binding);
        self
    }

    /// Appends a stage that reads `inputs` and writes `output`.
    #[must_use]
    pub fn stage(
        self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
        inputs: &[&str],
        output: impl Into<String>,
    ) -> Self {
        self.binding(
            StageBinding::new(name, runner)
                .with_inputs(inputs.iter().copied())
                .with_output(output),
        )
    }

    /// Appends a stage with a declared output shape.
    #[must_use]
    pub fn stage_with_shape(
        self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
        inputs: &[&str],
        output: impl Into<String>,
        shape: ShapeValidator,
    ) -> Self {
        self.binding(
            StageBinding::new(name, runner)
                .with_inputs(inputs.iter().copied())
                .with_output(output)
                .with_shape(shape),
        )
    }

    /// Appends a terminal stage with no output key.
    #[must_use]
    pub fn terminal(
        self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
        inputs: &[&str],
    ) -> Self {
        self.binding(StageBinding::new(name, runner).with_inputs(inputs.iter().copied()))
    }

    /// Validates and builds the definition.
    ///
    /// # Errors
    ///
    /// Returns a `DefinitionError` if any static invariant fails; see
    /// `PipelineDefinition::new`.
    pub fn build(self) -> Result<PipelineDefinition, DefinitionError> {
        PipelineDefinition::new(self.name, self.seed_keys, self.stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageOutcome;
    use crate::stages::FnStage;

    fn echo(value: serde_json::Value) -> Arc<dyn Stage> {
        Arc::new(FnStage::new(move |_| StageOutcome::value(value.clone())))
    }

    #[test]
    fn builds_valid_pipeline() {
        let definition = PipelineBuilder::new("council")
            .seed_key("trigger")
            .stage("Find", echo(serde_json::json!([])), &["trigger"], "signals")
            .stage_with_shape(
                "Decide",
                echo(serde_json::json!({"verdict": "x", "status": "APPROVED"})),
                &["signals"],
                "verdict",
                ShapeValidator::object(["verdict", "status"]),
            )
            .terminal("Persist", echo(serde_json::json!(null)), &["verdict"])
            .build()
            .unwrap();

        assert_eq!(definition.name(), "council");
        assert_eq!(definition.len(), 3);
        assert!(definition.stages()[1].shape.is_some());
        assert!(definition.stages()[2].output_key.is_none());
    }

    #[test]
    fn build_surfaces_definition_errors() {
        let result = PipelineBuilder::new("council")
            .stage("Find", echo(serde_json::json!([])), &["missing"], "signals")
            .build();
        assert!(result.is_err());
    }
}
