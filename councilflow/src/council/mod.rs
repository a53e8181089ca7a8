//! The executive decision council: a ready-made seven-stage pipeline.
//!
//! DataFinder fetches competitor undercutting signals, four advisor
//! stages (CMO, CFO, Ops, CEO) debate them in order, a logger persists
//! the full debate mid-run, and a reporter renders the final markdown
//! document. Each stage reads only the keys its predecessors wrote.

use crate::audit::AuditSink;
use crate::errors::DefinitionError;
use crate::pipeline::{PipelineBuilder, PipelineDefinition, StageBinding};
use crate::providers::{ReasoningService, SourceDataService, SourceQuery};
use crate::report::ReportTemplate;
use crate::stages::{AdvisorStage, FinderStage, PersistStage, RenderStage};
use crate::validation::ShapeValidator;
use std::sync::Arc;

/// The seed key carrying the caller's request.
pub const TRIGGER_KEY: &str = "trigger";
/// Output key of the DataFinder stage.
pub const SIGNALS_KEY: &str = "undercut_signals";
/// Output key of the CMO stage.
pub const CMO_KEY: &str = "cmo_proposal";
/// Output key of the CFO stage.
pub const CFO_KEY: &str = "cfo_rebuttal";
/// Output key of the Ops stage.
pub const OPS_KEY: &str = "ops_input";
/// Output key of the CEO stage.
pub const CEO_KEY: &str = "ceo_decision_json";
/// Output key of the final reporting stage.
pub const REPORT_KEY: &str = "final_report";

const CMO_TEMPLATE: &str = "\
The following competitor undercutting signals were detected: {undercut_signals}.
Propose a high-level marketing decision to counter the pricing threat, \
as one concise strategy.";

const CFO_TEMPLATE: &str = "\
The competitor undercutting signals are: {undercut_signals}.
The CMO's proposal is: {cmo_proposal}.
Propose a financial decision focused on profitability and budget allocation.";

const OPS_TEMPLATE: &str = "\
The competitor undercutting signals are: {undercut_signals}.
The CMO proposes: {cmo_proposal}. The CFO proposes: {cfo_rebuttal}.
Provide a concise operational input on feasibility, stock readiness, and \
potential delays.";

const CEO_TEMPLATE: &str = "\
Review the following inputs:
1. Undercut signals: {undercut_signals}
2. CMO proposal: {cmo_proposal}
3. CFO rebuttal: {cfo_rebuttal}
4. Ops input: {ops_input}

Synthesize these into a single final verdict and a status such as \
'APPROVED', 'DEFERRED' or 'REJECTED'. The output must be a JSON object \
with exactly two keys: \"verdict\" and \"status\".";

const FINDER_TEMPLATE: &str = "\
Identify products where a competitor's detected price is lower than our \
cost price, for the request: {trigger}.
Output a JSON list with product_id, name, cost_price, competitor_name and \
detected_price per match; output [] when nothing matches.";

/// The external collaborators and tuning knobs of the council pipeline.
#[derive(Clone)]
pub struct CouncilConfig {
    reasoning: Arc<dyn ReasoningService>,
    source: Arc<dyn SourceDataService>,
    audit: Arc<dyn AuditSink>,
    model: String,
}

impl std::fmt::Debug for CouncilConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouncilConfig")
            .field("model", &self.model)
            .finish()
    }
}

impl CouncilConfig {
    /// Wires the council to its reasoning, source-data and audit
    /// services.
    #[must_use]
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        source: Arc<dyn SourceDataService>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            reasoning,
            source,
            audit,
            model: "gemini-2.5-flash".to_string(),
        }
    }

    /// Overrides the reasoning model used by every advisor stage.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Builds the seven-stage executive decision pipeline.
///
/// # Errors
///
/// Returns a `DefinitionError` only if the fixed wiring is broken,
/// which the tests below rule out.
pub fn council_pipeline(config: &CouncilConfig) -> Result<PipelineDefinition, DefinitionError> {
    let advisor = |template: &str| {
        Arc::new(AdvisorStage::new(
            template,
            config.model.clone(),
            config.reasoning.clone(),
        ))
    };

    let finder_query = SourceQuery::new()
        .with_param("tables", serde_json::json!(["products", "market_signals"]))
        .with_param("filter", serde_json::json!("detected_price < cost_price"));

    let report_template = ReportTemplate::new("Executive Decision Report")
        .section("Undercut Products", SIGNALS_KEY)
        .section("CMO Proposal", CMO_KEY)
        .section("CFO Rebuttal", CFO_KEY)
        .section("Ops Input", OPS_KEY)
        .section("CEO Final Decision", CEO_KEY);

    PipelineBuilder::new("executive-decision-workflow")
        .seed_key(TRIGGER_KEY)
        .stage(
            "DataFinder",
            Arc::new(
                FinderStage::new(finder_query, config.source.clone()).with_reasoning(
                    FINDER_TEMPLATE,
                    config.model.clone(),
                    config.reasoning.clone(),
                ),
            ),
            &[TRIGGER_KEY],
            SIGNALS_KEY,
        )
        .stage("CMOAgent", advisor(CMO_TEMPLATE), &[SIGNALS_KEY], CMO_KEY)
        .stage(
            "CFOAgent",
            advisor(CFO_TEMPLATE),
            &[SIGNALS_KEY, CMO_KEY],
            CFO_KEY,
        )
        .stage(
            "OpsAgent",
            advisor(OPS_TEMPLATE),
            &[SIGNALS_KEY, CMO_KEY, CFO_KEY],
            OPS_KEY,
        )
        .stage_with_shape(
            "CEOAgent",
            advisor(CEO_TEMPLATE),
            &[SIGNALS_KEY, CMO_KEY, CFO_KEY, OPS_KEY],
            CEO_KEY,
            ShapeValidator::object(["verdict", "status"]),
        )
        .binding(
            StageBinding::new("CouncilLogger", Arc::new(PersistStage::new(config.audit.clone())))
                .with_inputs([SIGNALS_KEY, CMO_KEY, CFO_KEY, OPS_KEY, CEO_KEY]),
        )
        .stage(
            "FinalReporter",
            Arc::new(RenderStage::new(report_template)),
            &[SIGNALS_KEY, CMO_KEY, CFO_KEY, OPS_KEY, CEO_KEY],
            REPORT_KEY,
        )
        .build()
}
