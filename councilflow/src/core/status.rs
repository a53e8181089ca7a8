//! Run and stage status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of one pipeline run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// The run has been created but not started.
    Pending,
    /// The run is executing stages.
    Running,
    /// Every stage reached `Done` and the run record was persisted.
    Succeeded,
    /// Every stage reached `Done` but the audit sink rejected the run
    /// record. Degraded success, distinct from full success.
    SucceededUnaudited,
    /// A stage failed and the run aborted.
    Failed,
    /// The run was cancelled between stages.
    Cancelled,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::SucceededUnaudited => write!(f, "SUCCEEDED_UNAUDITED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if every stage completed, audited or not.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::SucceededUnaudited)
    }
}

/// The execution state of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageState {
    /// The stage has not begun.
    NotStarted,
    /// The stage is executing (possibly retrying).
    Running,
    /// The stage completed and its output was merged.
    Done,
    /// The stage failed and aborted the run.
    Failed,
}

impl Default for StageState {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Done => write!(f, "DONE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl StageState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_display() {
        assert_eq!(RunStatus::Succeeded.to_string(), "SUCCEEDED");
        assert_eq!(RunStatus::SucceededUnaudited.to_string(), "SUCCEEDED_UNAUDITED");
        assert_eq!(RunStatus::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn run_status_classification() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Succeeded.is_success());
        assert!(RunStatus::SucceededUnaudited.is_success());
        assert!(!RunStatus::Failed.is_success());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn stage_state_classification() {
        assert!(StageState::Done.is_terminal());
        assert!(StageState::Failed.is_terminal());
        assert!(!StageState::Running.is_terminal());
        assert!(!StageState::NotStarted.is_terminal());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&RunStatus::SucceededUnaudited).unwrap();
        assert_eq!(json, r#""SUCCEEDED_UNAUDITED""#);

        let back: StageState = serde_json::from_str(r#""NOT_STARTED""#).unwrap();
        assert_eq!(back, StageState::NotStarted);
    }
}
