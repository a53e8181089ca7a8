//! Run identity for tracking pipeline executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one end-to-end execution of a pipeline definition.
///
/// The run id is unique per run and keys the audit sink's upsert, so
/// retried persistence of the same run never duplicates its record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,
    /// The name of the pipeline being executed.
    pub pipeline: String,
    /// When the run started (UTC).
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            started_at: Utc::now(),
        }
    }

    /// Creates a run identity with a specific run ID.
    #[must_use]
    pub fn with_run_id(pipeline: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            started_at: Utc::now(),
        }
    }

    /// Returns the run ID as a string.
    #[must_use]
    pub fn run_id_str(&self) -> String {
        self.run_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = RunIdentity::new("council");
        let b = RunIdentity::new("council");
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.pipeline, "council");
    }

    #[test]
    fn with_run_id_pins_the_id() {
        let id = Uuid::new_v4();
        let identity = RunIdentity::with_run_id("council", id);
        assert_eq!(identity.run_id, id);
        assert_eq!(identity.run_id_str(), id.to_string());
    }

    #[test]
    fn serde_round_trip() {
        let identity = RunIdentity::new("council");
        let json = serde_json::to_string(&identity).unwrap();
        let back: RunIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity, back);
    }
}
