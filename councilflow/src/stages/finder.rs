//! The source-data finder stage.

use super::advisor::{interpolate, outcome_from_provider_error};
use super::{Stage, StageInputs};
use crate::core::StageOutcome;
use crate::providers::{ReasoningRequest, ReasoningService, SourceDataService, SourceQuery};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A stage that queries the source-data service for the facts the rest
/// of the pipeline reasons over.
///
/// When a reasoning service is attached, the fetched records are
/// appended to the rendered prompt and the reasoning response becomes
/// the stage's output. Without one, the raw record list is the output.
pub struct FinderStage {
    query: SourceQuery,
    source: Arc<dyn SourceDataService>,
    reasoning: Option<FinderReasoning>,
}

struct FinderReasoning {
    template: String,
    model: String,
    service: Arc<dyn ReasoningService>,
}

impl std::fmt::Debug for FinderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderStage")
            .field("query", &self.query)
            .field("has_reasoning", &self.reasoning.is_some())
            .finish()
    }
}

impl FinderStage {
    /// Creates a finder that outputs the raw record list.
    #[must_use]
    pub fn new(query: SourceQuery, source: Arc<dyn SourceDataService>) -> Self {
        Self {
            query,
            source,
            reasoning: None,
        }
    }

    /// Routes the fetched records through the reasoning service.
    #[must_use]
    pub fn with_reasoning(
        mut self,
        template: impl Into<String>,
        model: impl Into<String>,
        service: Arc<dyn ReasoningService>,
    ) -> Self {
        self.reasoning = Some(FinderReasoning {
            template: template.into(),
            model: model.into(),
            service,
        });
        self
    }
}

#[async_trait]
impl Stage for FinderStage {
    async fn invoke(&self, inputs: &StageInputs) -> StageOutcome {
        let records = match self.source.query(self.query.clone()).await {
            Ok(records) => records,
            Err(err) => return outcome_from_provider_error(&err),
        };
        debug!(stage = inputs.stage(), count = records.len(), "Fetched source records");

        let Some(reasoning) = &self.reasoning else {
            return StageOutcome::value(serde_json::Value::Array(records));
        };

        let prompt = format!(
            "{}\n\nRecords:\n{}",
            interpolate(&reasoning.template, inputs),
            serde_json::Value::Array(records.clone())
        );
        let request = ReasoningRequest::new(prompt, reasoning.model.clone())
            .with_inputs(inputs.values().clone());

        match reasoning.service.complete(request).await {
            Ok(response) => StageOutcome::value(response.value),
            Err(err) => outcome_from_provider_error(&err),
        }
    }
}
