//! # Councilflow
//!
//! A sequential decision-pipeline orchestration engine.
//!
//! Councilflow runs ordered pipelines of stages over a write-once
//! context store, with support for:
//!
//! - **Validated definitions**: every stage input is checked against the
//!   seed keys and earlier outputs before anything runs
//! - **Bounded retries**: transient failures retry with backoff and
//!   jitter; permanent failures abort immediately
//! - **Best-effort auditing**: every run, however it ends, is offered to
//!   the audit sink as an immutable record keyed by run id
//! - **Event-driven observability**: structured lifecycle events for
//!   monitoring
//! - **A reference pipeline**: the seven-stage executive decision
//!   council in [`council`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use councilflow::prelude::*;
//!
//! let definition = PipelineBuilder::new("find-decide-persist")
//!     .seed_key("trigger")
//!     .stage("Find", finder, &["trigger"], "signals")
//!     .stage("Decide", advisor, &["signals"], "decision")
//!     .stage("Persist", persist, &["decision"], "persist_ack")
//!     .build()?;
//!
//! let orchestrator = Orchestrator::new(audit_sink);
//! let report = orchestrator.run(&definition, seed).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod audit;
pub mod context;
pub mod core;
pub mod council;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod stages;
pub mod testing;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditAck, AuditError, AuditSink, JsonFileAuditSink, MemoryAuditSink};
    pub use crate::context::{ContextSnapshot, ContextStore, RunIdentity};
    pub use crate::core::{FailureKind, RunRecord, RunStatus, StageOutcome, StageState};
    pub use crate::council::{council_pipeline, CouncilConfig};
    pub use crate::errors::{
        CouncilError, DefinitionError, DuplicateKeyError, MissingKeyError, OrchestrationDefect,
        StageFailure,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        BackoffStrategy, CancelHandle, JitterStrategy, Orchestrator, PipelineBuilder,
        PipelineDefinition, RetryPolicy, RunReport, StageBinding,
    };
    pub use crate::providers::{
        ProviderError, ReasoningRequest, ReasoningResponse, ReasoningService, SourceDataService,
        SourceQuery,
    };
    pub use crate::report::{render, ReportTemplate};
    pub use crate::stages::{
        AdvisorStage, FinderStage, FnStage, PersistStage, RenderStage, Stage, StageInputs,
    };
    pub use crate::validation::{ShapeError, ShapeValidator};
}
