//! Stage bindings and validated pipeline definitions.

use crate::errors::DefinitionError;
use crate::stages::Stage;
use crate::validation::ShapeValidator;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One stage's place in a pipeline: its name, declared input keys, the
/// single output key it writes (if any), the runner, and an optional
/// output-shape validator.
#[derive(Debug, Clone)]
pub struct StageBinding {
    /// The stage name, unique within a pipeline definition.
    pub name: String,
    /// Context keys the stage reads, in declaration order.
    pub input_keys: Vec<String>,
    /// The single key the stage writes, or none for a pure
    /// side-effecting terminal stage.
    pub output_key: Option<String>,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Expected shape of the output value; violations are permanent
    /// failures.
    pub shape: Option<ShapeValidator>,
}

impl StageBinding {
    /// Creates a binding with no inputs, no output key, and no shape.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            input_keys: Vec::new(),
            output_key: None,
            runner,
            shape: None,
        }
    }

    /// Declares the input keys.
    #[must_use]
    pub fn with_inputs(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.input_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Declares the output key.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Declares the expected output shape.
    #[must_use]
    pub fn with_shape(mut self, shape: ShapeValidator) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// An ordered sequence of stage bindings plus the declared seed-key set.
///
/// Immutable after construction. The constructor checks the
/// key-dependency invariant once, so a whole class of missing-key
/// runtime errors becomes a configuration-time `DefinitionError`.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    seed_keys: Vec<String>,
    stages: Vec<StageBinding>,
}

impl PipelineDefinition {
    /// Builds and validates a pipeline definition.
    ///
    /// # Errors
    ///
    /// Returns a `DefinitionError` if the name is blank, the stage list
    /// is empty, a stage name or output key repeats, a seed key repeats
    /// or collides with an output key, or any stage reads a key no seed
    /// entry or earlier stage produces.
    pub fn new(
        name: impl Into<String>,
        seed_keys: Vec<String>,
        stages: Vec<StageBinding>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DefinitionError::BlankName);
        }
        if stages.is_empty() {
            return Err(DefinitionError::Empty { pipeline: name });
        }

        // key -> producing stage ("seed" for seed keys)
        let mut producers: HashMap<String, String> = HashMap::new();
        for key in &seed_keys {
            if producers
                .insert(key.clone(), "seed".to_string())
                .is_some()
            {
                return Err(DefinitionError::DuplicateSeedKey { key: key.clone() });
            }
        }

        let mut names: HashSet<&str> = HashSet::new();
        for binding in &stages {
            if !names.insert(binding.name.as_str()) {
                return Err(DefinitionError::DuplicateStageName {
                    stage: binding.name.clone(),
                });
            }

            for key in &binding.input_keys {
                if !producers.contains_key(key) {
                    return Err(DefinitionError::UnresolvedInput {
                        stage: binding.name.clone(),
                        key: key.clone(),
                    });
                }
            }

            if let Some(output) = &binding.output_key {
                if let Some(producer) = producers.get(output) {
                    return Err(DefinitionError::DuplicateOutputKey {
                        stage: binding.name.clone(),
                        key: output.clone(),
                        producer: producer.clone(),
                    });
                }
                producers.insert(output.clone(), binding.name.clone());
            }
        }

        Ok(Self {
            name,
            seed_keys,
            stages,
        })
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared seed keys.
    #[must_use]
    pub fn seed_keys(&self) -> &[String] {
        &self.seed_keys
    }

    /// The stage bindings in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageBinding] {
        &self.stages
    }

    /// The number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the definition has no stages. Always false for a
    /// validated definition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
