//! Core value types: run/stage statuses, stage outcomes, and the
//! persisted run record.

mod outcome;
mod record;
mod status;

pub use outcome::{FailureKind, StageOutcome};
pub use record::RunRecord;
pub use status::{RunStatus, StageState};
