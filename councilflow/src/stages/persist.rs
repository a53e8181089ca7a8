//! The persistence terminal stage.

use super::{Stage, StageInputs};
use crate::audit::{AuditError, AuditSink};
use crate::core::{RunRecord, RunStatus, StageOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A terminal stage that writes the current context snapshot plus run
/// metadata through the audit sink.
///
/// The record is tagged `RUNNING`: the orchestrator's own finalization
/// upserts the terminal record under the same run id, so a mid-pipeline
/// persist never leaves a stale status behind.
pub struct PersistStage {
    sink: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for PersistStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistStage").finish()
    }
}

impl PersistStage {
    /// Creates a persistence stage writing through the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Stage for PersistStage {
    async fn invoke(&self, inputs: &StageInputs) -> StageOutcome {
        let record = RunRecord::new(
            inputs.identity(),
            RunStatus::Running,
            inputs.snapshot().clone(),
            inputs.produced().to_vec(),
        );

        match self.sink.persist(&record).await {
            Ok(ack) => {
                debug!(stage = inputs.stage(), run_id = %ack.run_id, "Persisted context snapshot");
                match serde_json::to_value(&ack) {
                    Ok(value) => StageOutcome::value(value),
                    Err(e) => StageOutcome::permanent(format!("serialize ack: {e}")),
                }
            }
            Err(AuditError::Unavailable(msg)) => StageOutcome::transient(msg),
            Err(AuditError::Rejected(msg)) => StageOutcome::permanent(msg),
        }
    }
}
