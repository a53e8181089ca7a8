//! The report-rendering terminal stage.

use super::{Stage, StageInputs};
use crate::core::StageOutcome;
use crate::report::{render, ReportTemplate};
use async_trait::async_trait;

/// A terminal stage that formats selected context entries into a
/// human-readable document.
///
/// Pure: no external services, no failure modes. Keys absent from the
/// snapshot render marked placeholders.
#[derive(Debug, Clone)]
pub struct RenderStage {
    template: ReportTemplate,
}

impl RenderStage {
    /// Creates a rendering stage for the given template.
    #[must_use]
    pub fn new(template: ReportTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Stage for RenderStage {
    async fn invoke(&self, inputs: &StageInputs) -> StageOutcome {
        let document = render(inputs.snapshot(), &self.template);
        StageOutcome::value(serde_json::Value::String(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_inputs;
    use std::collections::HashMap;

    #[tokio::test]
    async fn render_stage_produces_document() {
        let template = ReportTemplate::new("Report").section("Verdict", "verdict");
        let stage = RenderStage::new(template);

        let mut values = HashMap::new();
        values.insert("verdict".to_string(), serde_json::json!("APPROVED"));

        let outcome = stage.invoke(&test_inputs("FinalReporter", values)).await;
        let doc = outcome.into_value().unwrap();
        let doc = doc.as_str().unwrap();
        assert!(doc.contains("# Report"));
        assert!(doc.contains("APPROVED"));
    }

    #[tokio::test]
    async fn render_stage_never_fails_on_missing_keys() {
        let template = ReportTemplate::new("Report").section("Verdict", "verdict");
        let stage = RenderStage::new(template);

        let outcome = stage.invoke(&test_inputs("FinalReporter", HashMap::new())).await;
        assert!(outcome.is_success());
    }
}
