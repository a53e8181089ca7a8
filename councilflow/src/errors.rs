//! Error types for the councilflow orchestrator.
//!
//! The taxonomy separates configuration-time problems (`DefinitionError`),
//! internal invariant violations (`OrchestrationDefect`), stage-level
//! failures (`StageFailure`), and persistence problems (`AuditError`).

use crate::core::FailureKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for councilflow operations.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// The pipeline definition is invalid; detected at construction time.
    #[error("{0}")]
    Definition(#[from] DefinitionError),

    /// A write-once violation in the context store.
    #[error("{0}")]
    DuplicateKey(#[from] DuplicateKeyError),

    /// A context store lookup miss.
    #[error("{0}")]
    MissingKey(#[from] MissingKeyError),

    /// A declared input key could not be resolved at run time despite
    /// passing definition-time validation. Indicates an internal bug.
    #[error("{0}")]
    Defect(#[from] OrchestrationDefect),

    /// A stage failed permanently or exhausted its retries.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// The audit sink could not persist a run record.
    #[error("{0}")]
    Audit(#[from] crate::audit::AuditError),

    /// The run was cancelled between stages.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// The seed payload's keys do not match the pipeline's declared
    /// seed-key set.
    #[error("Seed keys mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SeedMismatch {
        /// Declared seed keys absent from the payload.
        missing: Vec<String>,
        /// Payload keys the definition does not declare.
        unexpected: Vec<String>,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CouncilError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a pipeline definition violates a static invariant.
///
/// Definition errors are fatal to configuration and never occur mid-run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// The pipeline has no stages.
    #[error("Pipeline '{pipeline}' has no stages")]
    Empty {
        /// The pipeline name.
        pipeline: String,
    },

    /// The pipeline name is empty or whitespace-only.
    #[error("Pipeline name cannot be empty or whitespace-only")]
    BlankName,

    /// Two stages share the same name.
    #[error("Duplicate stage name '{stage}'")]
    DuplicateStageName {
        /// The repeated stage name.
        stage: String,
    },

    /// Two stages declare the same output key, or a stage redeclares a
    /// key its predecessor already produces.
    #[error("Stage '{stage}' declares output key '{key}' already produced by '{producer}'")]
    DuplicateOutputKey {
        /// The stage redeclaring the key.
        stage: String,
        /// The conflicting key.
        key: String,
        /// The earlier producer of the key (a stage name or "seed").
        producer: String,
    },

    /// A stage reads a key that no seed entry or earlier stage produces.
    #[error("Stage '{stage}' reads key '{key}' which is not a seed key or an earlier stage's output")]
    UnresolvedInput {
        /// The stage with the dangling input.
        stage: String,
        /// The unresolvable key.
        key: String,
    },

    /// The same key was declared as a seed key twice.
    #[error("Seed key '{key}' declared more than once")]
    DuplicateSeedKey {
        /// The repeated seed key.
        key: String,
    },
}

/// Error raised when writing to an existing key in the context store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Duplicate key: '{key}' already exists in the context store")]
pub struct DuplicateKeyError {
    /// The conflicting key.
    pub key: String,
}

impl DuplicateKeyError {
    /// Creates a new duplicate key error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error raised when reading an absent key from the context store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Missing key: '{key}' is not present in the context store")]
pub struct MissingKeyError {
    /// The absent key.
    pub key: String,
}

impl MissingKeyError {
    /// Creates a new missing key error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error raised when input resolution fails for a validated pipeline.
///
/// This must never happen for a definition that passed validation and is
/// executed in order; its occurrence is an orchestrator bug, not a normal
/// runtime condition, and it aborts the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Orchestration defect: stage '{stage}' could not resolve input key '{key}' at run time")]
pub struct OrchestrationDefect {
    /// The stage whose input resolution failed.
    pub stage: String,
    /// The unresolvable key.
    pub key: String,
}

impl OrchestrationDefect {
    /// Creates a new orchestration defect.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
        }
    }
}

/// Error describing a failed stage, aborting its run.
///
/// Transient failures only become a `StageFailure` once the retry budget
/// is exhausted; the `attempts` field records how many invocations were
/// made in total.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("Stage '{stage}' failed after {attempts} attempt(s): {message}")]
pub struct StageFailure {
    /// The failing stage's name.
    pub stage: String,
    /// The failure message from the last attempt.
    pub message: String,
    /// Whether the terminal failure was transient (retries exhausted) or
    /// permanent (failed immediately).
    pub kind: FailureKind,
    /// Total invocation attempts made.
    pub attempts: u32,
}

impl StageFailure {
    /// Creates a permanent stage failure from a single attempt.
    #[must_use]
    pub fn permanent(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            kind: FailureKind::Permanent,
            attempts: 1,
        }
    }

    /// Creates a stage failure from exhausted transient retries.
    #[must_use]
    pub fn exhausted(stage: impl Into<String>, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            kind: FailureKind::Transient,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_error_messages_name_the_offender() {
        let err = DefinitionError::UnresolvedInput {
            stage: "Decide".to_string(),
            key: "signals".to_string(),
        };
        assert!(err.to_string().contains("Decide"));
        assert!(err.to_string().contains("signals"));
    }

    #[test]
    fn stage_failure_constructors() {
        let perm = StageFailure::permanent("Decide", "bad shape");
        assert_eq!(perm.kind, FailureKind::Permanent);
        assert_eq!(perm.attempts, 1);

        let trans = StageFailure::exhausted("Find", "timeout", 3);
        assert_eq!(trans.kind, FailureKind::Transient);
        assert_eq!(trans.attempts, 3);
        assert!(trans.to_string().contains("3 attempt(s)"));
    }

    #[test]
    fn council_error_wraps_defect() {
        let err: CouncilError = OrchestrationDefect::new("Ops", "ops_input").into();
        assert!(err.to_string().contains("Orchestration defect"));
    }
}
