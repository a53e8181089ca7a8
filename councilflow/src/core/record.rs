//! The run record persisted by the audit sink.

use super::RunStatus;
use crate::context::{ContextSnapshot, RunIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A finalized snapshot of one run, produced at run end and never
/// mutated after persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    /// The unique run identifier (the audit sink's upsert key).
    pub run_id: Uuid,
    /// The pipeline that was executed.
    pub pipeline: String,
    /// When the run started (UTC).
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status (UTC).
    pub ended_at: DateTime<Utc>,
    /// The terminal run status.
    pub status: RunStatus,
    /// The context snapshot at termination (full on success, partial on
    /// abort).
    pub snapshot: ContextSnapshot,
    /// Ordered (stage name, output value) pairs actually produced
    /// before termination. Terminal stages without an output key do not
    /// appear here.
    pub outputs: Vec<(String, serde_json::Value)>,
    /// The failing stage's name, when the run aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    /// The failing stage's error message, when the run aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hex sha256 over the serialized snapshot and outputs.
    pub digest: String,
}

impl RunRecord {
    /// Builds a run record for a terminal run.
    #[must_use]
    pub fn new(
        identity: &RunIdentity,
        status: RunStatus,
        snapshot: ContextSnapshot,
        outputs: Vec<(String, serde_json::Value)>,
    ) -> Self {
        let digest = content_digest(&snapshot, &outputs);
        Self {
            run_id: identity.run_id,
            pipeline: identity.pipeline.clone(),
            started_at: identity.started_at,
            ended_at: Utc::now(),
            status,
            snapshot,
            outputs,
            failed_stage: None,
            error: None,
            digest,
        }
    }

    /// Attaches the failing stage and error for an aborted run.
    #[must_use]
    pub fn with_failure(mut self, stage: impl Into<String>, error: impl Into<String>) -> Self {
        self.failed_stage = Some(stage.into());
        self.error = Some(error.into());
        self
    }

    /// Returns the names of stages that produced an output, in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|(name, _)| name.as_str()).collect()
    }
}

fn content_digest(
    snapshot: &ContextSnapshot,
    outputs: &[(String, serde_json::Value)],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.to_json().to_string().as_bytes());
    for (name, value) in outputs {
        hasher.update(name.as_bytes());
        hasher.update(value.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}
