//! The generic reasoning-call stage.

use super::{Stage, StageInputs};
use crate::core::StageOutcome;
use crate::providers::{ProviderError, ReasoningRequest, ReasoningService};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        // The pattern is a literal, so construction cannot fail.
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap()
    })
}

/// Renders a prompt template, substituting `{key}` placeholders with the
/// resolved input values. String values are inserted raw; structured
/// values are inserted as compact JSON. Unknown placeholders are left
/// untouched so they stay visible in the outgoing prompt.
#[must_use]
pub(crate) fn interpolate(template: &str, inputs: &StageInputs) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures<'_>| {
            match inputs.get(&caps[1]) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub(crate) fn outcome_from_provider_error(err: &ProviderError) -> StageOutcome {
    if err.is_transient() {
        StageOutcome::transient(err.to_string())
    } else {
        StageOutcome::permanent(err.to_string())
    }
}

/// A stage bound to one call against the generative reasoning service.
///
/// The prompt template references named context keys via `{key}`
/// interpolation; the resolved values travel with the request so the
/// service sees both the rendered prompt and the raw inputs.
pub struct AdvisorStage {
    template: String,
    model: String,
    service: Arc<dyn ReasoningService>,
}

impl std::fmt::Debug for AdvisorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorStage")
            .field("model", &self.model)
            .finish()
    }
}

impl AdvisorStage {
    /// Creates an advisor stage with a prompt template and model.
    #[must_use]
    pub fn new(
        template: impl Into<String>,
        model: impl Into<String>,
        service: Arc<dyn ReasoningService>,
    ) -> Self {
        Self {
            template: template.into(),
            model: model.into(),
            service,
        }
    }
}

#[async_trait]
impl Stage for AdvisorStage {
    async fn invoke(&self, inputs: &StageInputs) -> StageOutcome {
        let prompt = interpolate(&self.template, inputs);
        debug!(stage = inputs.stage(), model = %self.model, "Calling reasoning service");

        let request = ReasoningRequest::new(prompt, self.model.clone())
            .with_inputs(inputs.values().clone());

        match self.service.complete(request).await {
            Ok(response) => StageOutcome::value(response.value),
            Err(err) => outcome_from_provider_error(&err),
        }
    }
}
