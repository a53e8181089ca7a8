//! Stage invocation outcomes and failure classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifies a stage failure for the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An upstream hiccup (timeout, rate limit). Retried with bounded
    /// backoff; exhaustion converts to a permanent stage failure.
    Transient,
    /// Unrecoverable: malformed or shape-invalid output, rejected
    /// request. Aborts the run immediately, no retry.
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// The result of one stage invocation.
///
/// Outcomes are immutable once created; the orchestrator classifies
/// them into continue / retry / abort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Success with a value for the stage's declared output key.
    Value {
        /// The produced value.
        value: serde_json::Value,
    },
    /// Success with no value (pure side-effecting terminal stage).
    Done,
    /// The invocation failed.
    Failure {
        /// Transient or permanent.
        kind: FailureKind,
        /// Human-readable failure message.
        message: String,
    },
}

impl StageOutcome {
    /// Creates a success outcome carrying a value.
    #[must_use]
    pub fn value(value: serde_json::Value) -> Self {
        Self::Value { value }
    }

    /// Creates a transient failure outcome.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Failure {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    /// Creates a permanent failure outcome.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Failure {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    /// Returns true if the outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Value { .. } | Self::Done)
    }

    /// Returns true if the outcome is a retryable failure.
    #[must_use]
    pub fn is_transient_failure(&self) -> bool {
        matches!(
            self,
            Self::Failure {
                kind: FailureKind::Transient,
                ..
            }
        )
    }

    /// Returns the produced value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            Self::Value { value } => Some(value),
            _ => None,
        }
    }

    /// Returns the failure message, if the outcome is a failure.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Failure { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_outcome() {
        let outcome = StageOutcome::value(serde_json::json!({"verdict": "APPROVED"}));
        assert!(outcome.is_success());
        assert!(!outcome.is_transient_failure());
        assert_eq!(
            outcome.into_value(),
            Some(serde_json::json!({"verdict": "APPROVED"}))
        );
    }

    #[test]
    fn done_outcome_has_no_value() {
        let outcome = StageOutcome::Done;
        assert!(outcome.is_success());
        assert!(outcome.into_value().is_none());
    }

    #[test]
    fn failure_classification() {
        let transient = StageOutcome::transient("rate limited");
        assert!(transient.is_transient_failure());
        assert_eq!(transient.failure_message(), Some("rate limited"));

        let permanent = StageOutcome::permanent("malformed output");
        assert!(!permanent.is_transient_failure());
        assert!(!permanent.is_success());
    }

    #[test]
    fn serde_tagging() {
        let json = serde_json::to_value(StageOutcome::transient("slow")).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["kind"], "transient");
    }
}
