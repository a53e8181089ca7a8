//! The orchestrator: executes a pipeline definition against a fresh
//! context store for one run.
//!
//! Stages run in strict declaration order; no stage begins before its
//! predecessor is done. The orchestrator itself is stateless and safely
//! reusable across concurrently executing runs, each of which owns its
//! own context store.

use super::{PipelineDefinition, RetryPolicy, StageBinding};
use crate::audit::{AuditAck, AuditError, AuditSink};
use crate::context::{ContextSnapshot, ContextStore, RunIdentity};
use crate::core::{FailureKind, RunRecord, RunStatus, StageOutcome, StageState};
use crate::errors::{CouncilError, OrchestrationDefect, StageFailure};
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::StageInputs;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A handle for cancelling a run between stages.
///
/// Cancellation is checked once per stage, before invocation; an
/// in-flight invocation is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a fresh, uncancelled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The caller-facing result of one run.
///
/// Stage failures and cancellations are reported here as structured
/// status, never as an opaque error.
#[derive(Debug)]
pub struct RunReport {
    /// The run's identity.
    pub identity: RunIdentity,
    /// The terminal run status.
    pub status: RunStatus,
    /// The context snapshot at termination.
    pub snapshot: ContextSnapshot,
    /// Per-stage terminal states, in declaration order.
    pub stage_states: Vec<(String, StageState)>,
    /// Ordered (stage name, output value) pairs produced.
    pub outputs: Vec<(String, serde_json::Value)>,
    /// The stage failure that aborted the run, if any.
    pub failure: Option<StageFailure>,
    /// Acknowledgement of the terminal audit write, when it succeeded.
    pub audit: Option<AuditAck>,
    /// The audit error, when the terminal audit write failed.
    pub audit_error: Option<AuditError>,
}

impl RunReport {
    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The name of the failing stage, if the run aborted on one.
    #[must_use]
    pub fn failing_stage(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.stage.as_str())
    }
}

/// Executes pipeline definitions.
pub struct Orchestrator {
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventSink>,
    retry: RetryPolicy,
    stage_timeout: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator persisting through the given audit sink.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            events: Arc::new(NoOpEventSink),
            retry: RetryPolicy::default(),
            stage_timeout: Duration::from_secs(30),
        }
    }

    /// Attaches an event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the retry policy for transient stage failures.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-stage time budget. Exceeding it is a transient
    /// failure subject to the retry policy.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Runs a pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns `CouncilError::SeedMismatch` if the seed payload does not
    /// match the definition's declared seed keys, and
    /// `CouncilError::Defect` if input resolution fails despite
    /// definition-time validation. Stage failures and cancellations are
    /// reported through the returned `RunReport`, not as errors.
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        seed: Vec<(String, serde_json::Value)>,
    ) -> Result<RunReport, CouncilError> {
        self.run_cancellable(definition, seed, &CancelHandle::new())
            .await
    }

    /// Runs a pipeline with a cancellation handle checked between
    /// stages.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run_cancellable(
        &self,
        definition: &PipelineDefinition,
        seed: Vec<(String, serde_json::Value)>,
        cancel: &CancelHandle,
    ) -> Result<RunReport, CouncilError> {
        check_seed_keys(definition, &seed)?;

        let identity = RunIdentity::new(definition.name());
        let store = ContextStore::new();
        store.seed(seed)?;

        info!(run_id = %identity.run_id, pipeline = definition.name(), "Run started");
        self.events.try_emit(
            "run.started",
            Some(serde_json::json!({
                "run_id": identity.run_id_str(),
                "pipeline": definition.name(),
            })),
        );

        let mut states: Vec<(String, StageState)> = definition
            .stages()
            .iter()
            .map(|b| (b.name.clone(), StageState::NotStarted))
            .collect();
        let mut produced: Vec<(String, serde_json::Value)> = Vec::new();

        for (idx, binding) in definition.stages().iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(self
                    .finalize(&identity, &store, produced, states, RunStatus::Cancelled, None)
                    .await);
            }

            states[idx].1 = StageState::Running;
            self.events.try_emit(
                "stage.started",
                Some(serde_json::json!({"stage": binding.name})),
            );

            let mut values = HashMap::new();
            for key in &binding.input_keys {
                match store.get(key) {
                    Ok(value) => {
                        values.insert(key.clone(), value);
                    }
                    Err(_) => {
                        states[idx].1 = StageState::Failed;
                        let defect = OrchestrationDefect::new(&binding.name, key);
                        error!(
                            run_id = %identity.run_id,
                            stage = binding.name,
                            key = key.as_str(),
                            "Input resolution failed for a validated pipeline"
                        );
                        let record = RunRecord::new(
                            &identity,
                            RunStatus::Failed,
                            store.snapshot(),
                            produced.clone(),
                        )
                        .with_failure(&binding.name, defect.to_string());
                        self.try_audit(&record).await;
                        return Err(defect.into());
                    }
                }
            }

            let inputs = StageInputs::new(
                &binding.name,
                identity.clone(),
                values,
                store.snapshot(),
                produced.clone(),
            );

            match self.invoke_with_retry(binding, &inputs).await {
                Ok(outcome) => {
                    if let Some(output_key) = &binding.output_key {
                        match outcome {
                            StageOutcome::Value { value } => {
                                store.put(output_key.clone(), value.clone())?;
                                produced.push((binding.name.clone(), value));
                            }
                            _ => {
                                states[idx].1 = StageState::Failed;
                                let failure = StageFailure::permanent(
                                    &binding.name,
                                    format!("produced no value for declared output key '{output_key}'"),
                                );
                                return Ok(self
                                    .finalize(
                                        &identity,
                                        &store,
                                        produced,
                                        states,
                                        RunStatus::Failed,
                                        Some(failure),
                                    )
                                    .await);
                            }
                        }
                    }
                    states[idx].1 = StageState::Done;
                    self.events.try_emit(
                        "stage.completed",
                        Some(serde_json::json!({"stage": binding.name})),
                    );
                }
                Err(failure) => {
                    states[idx].1 = StageState::Failed;
                    self.events.try_emit(
                        "stage.failed",
                        Some(serde_json::json!({
                            "stage": binding.name,
                            "error": failure.message,
                            "attempts": failure.attempts,
                        })),
                    );
                    return Ok(self
                        .finalize(&identity, &store, produced, states, RunStatus::Failed, Some(failure))
                        .await);
                }
            }
        }

        Ok(self
            .finalize(&identity, &store, produced, states, RunStatus::Succeeded, None)
            .await)
    }

    /// Invokes one stage under the time budget, retrying transient
    /// failures up to the policy's bound.
    async fn invoke_with_retry(
        &self,
        binding: &StageBinding,
        inputs: &StageInputs,
    ) -> Result<StageOutcome, StageFailure> {
        let mut attempt: u32 = 1;
        loop {
            let outcome =
                match tokio::time::timeout(self.stage_timeout, binding.runner.invoke(inputs)).await
                {
                    Ok(outcome) => outcome,
                    Err(_) => StageOutcome::transient(format!(
                        "stage timed out after {}ms",
                        self.stage_timeout.as_millis()
                    )),
                };

            let (kind, message) = match outcome {
                StageOutcome::Value { value } => {
                    if let Some(shape) = &binding.shape {
                        if let Err(e) = shape.validate(&value) {
                            return Err(StageFailure {
                                stage: binding.name.clone(),
                                message: format!("output shape invalid: {e}"),
                                kind: FailureKind::Permanent,
                                attempts: attempt,
                            });
                        }
                    }
                    return Ok(StageOutcome::Value { value });
                }
                StageOutcome::Done => return Ok(StageOutcome::Done),
                StageOutcome::Failure { kind, message } => (kind, message),
            };

            match kind {
                FailureKind::Permanent => {
                    return Err(StageFailure {
                        stage: binding.name.clone(),
                        message,
                        kind: FailureKind::Permanent,
                        attempts: attempt,
                    });
                }
                FailureKind::Transient => {
                    if attempt >= self.retry.max_attempts {
                        return Err(StageFailure::exhausted(&binding.name, message, attempt));
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        stage = binding.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = message.as_str(),
                        "Retrying stage after transient failure"
                    );
                    self.events.try_emit(
                        "stage.retrying",
                        Some(serde_json::json!({
                            "stage": binding.name,
                            "attempt": attempt,
                            "error": message,
                        })),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Builds the terminal run record, persists it (best effort), and
    /// assembles the run report.
    async fn finalize(
        &self,
        identity: &RunIdentity,
        store: &ContextStore,
        produced: Vec<(String, serde_json::Value)>,
        states: Vec<(String, StageState)>,
        status: RunStatus,
        failure: Option<StageFailure>,
    ) -> RunReport {
        let snapshot = store.snapshot();
        let mut record = RunRecord::new(identity, status, snapshot.clone(), produced.clone());
        if let Some(f) = &failure {
            record = record.with_failure(&f.stage, &f.message);
        }

        let event = match status {
            RunStatus::Succeeded => "run.succeeded",
            RunStatus::Cancelled => "run.cancelled",
            _ => "run.failed",
        };
        self.events.try_emit(
            event,
            Some(serde_json::json!({
                "run_id": identity.run_id_str(),
                "status": status.to_string(),
                "failed_stage": failure.as_ref().map(|f| f.stage.clone()),
            })),
        );

        let (audit, audit_error) = self.try_audit(&record).await;

        // Persistence failure on a fully successful run is degraded
        // success, not failure.
        let status = if status == RunStatus::Succeeded && audit_error.is_some() {
            RunStatus::SucceededUnaudited
        } else {
            status
        };

        info!(
            run_id = %identity.run_id,
            status = %status,
            stages = produced.len(),
            "Run finished"
        );

        RunReport {
            identity: identity.clone(),
            status,
            snapshot,
            stage_states: states,
            outputs: produced,
            failure,
            audit,
            audit_error,
        }
    }

    async fn try_audit(&self, record: &RunRecord) -> (Option<AuditAck>, Option<AuditError>) {
        match self.audit.persist(record).await {
            Ok(ack) => {
                self.events.try_emit(
                    "audit.persisted",
                    Some(serde_json::json!({"run_id": record.run_id.to_string()})),
                );
                (Some(ack), None)
            }
            Err(e) => {
                warn!(
                    run_id = %record.run_id,
                    error = %e,
                    "Best-effort audit write failed"
                );
                self.events.try_emit(
                    "audit.failed",
                    Some(serde_json::json!({
                        "run_id": record.run_id.to_string(),
                        "error": e.to_string(),
                    })),
                );
                (None, Some(e))
            }
        }
    }
}

fn check_seed_keys(
    definition: &PipelineDefinition,
    seed: &[(String, serde_json::Value)],
) -> Result<(), CouncilError> {
    let declared: HashSet<&str> = definition.seed_keys().iter().map(String::as_str).collect();
    let provided: HashSet<&str> = seed.iter().map(|(k, _)| k.as_str()).collect();

    let mut missing: Vec<String> = declared
        .difference(&provided)
        .map(|k| (*k).to_string())
        .collect();
    let mut unexpected: Vec<String> = provided
        .difference(&declared)
        .map(|k| (*k).to_string())
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    missing.sort();
    unexpected.sort();
    Err(CouncilError::SeedMismatch {
        missing,
        unexpected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::core::StageOutcome;
    use crate::pipeline::{JitterStrategy, PipelineBuilder};
    use crate::stages::FnStage;

    fn echo(value: serde_json::Value) -> Arc<dyn crate::stages::Stage> {
        Arc::new(FnStage::new(move |_| StageOutcome::value(value.clone())))
    }

    fn orchestrator(sink: Arc<MemoryAuditSink>) -> Orchestrator {
        Orchestrator::new(sink)
            .with_retry(
                RetryPolicy::new()
                    .with_base_delay_ms(1)
                    .with_jitter(JitterStrategy::None),
            )
            .with_stage_timeout(Duration::from_secs(2))
    }

    fn two_stage() -> PipelineDefinition {
        PipelineBuilder::new("mini")
            .seed_key("trigger")
            .stage("Find", echo(serde_json::json!([1, 2])), &["trigger"], "signals")
            .stage("Decide", echo(serde_json::json!("APPROVED")), &["signals"], "verdict")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn seed_mismatch_is_rejected() {
        let orchestrator = orchestrator(Arc::new(MemoryAuditSink::new()));
        let definition = two_stage();

        let err = orchestrator
            .run(&definition, vec![("wrong".to_string(), serde_json::json!(1))])
            .await
            .unwrap_err();

        assert!(matches!(err, CouncilError::SeedMismatch { .. }));
    }

    #[tokio::test]
    async fn successful_run_has_one_output_per_stage() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = orchestrator(sink.clone());
        let definition = two_stage();

        let report = orchestrator
            .run(
                &definition,
                vec![("trigger".to_string(), serde_json::json!("check pricing"))],
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.snapshot.keys(), vec!["trigger", "signals", "verdict"]);
        assert_eq!(report.outputs.len(), 2);
        assert!(report.audit.is_some());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn cancel_handle_stops_between_stages() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = orchestrator(sink.clone());
        let cancel = CancelHandle::new();

        // The first stage raises the flag; the second must not run.
        let cancel_inner = cancel.clone();
        let definition = PipelineBuilder::new("mini")
            .seed_key("trigger")
            .stage(
                "First",
                Arc::new(FnStage::new(move |_| {
                    cancel_inner.cancel();
                    StageOutcome::value(serde_json::json!(1))
                })),
                &["trigger"],
                "first_out",
            )
            .stage("Second", echo(serde_json::json!(2)), &["first_out"], "second_out")
            .build()
            .unwrap();

        let report = orchestrator
            .run_cancellable(
                &definition,
                vec![("trigger".to_string(), serde_json::json!("go"))],
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.stage_states[1].1, StageState::NotStarted);

        let record = sink.get(report.identity.run_id).unwrap();
        assert_eq!(record.status, RunStatus::Cancelled);
        assert_eq!(record.stage_names(), vec!["First"]);
    }

    #[tokio::test]
    async fn stage_declaring_output_but_returning_done_fails() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = orchestrator(sink);

        let definition = PipelineBuilder::new("mini")
            .seed_key("trigger")
            .stage(
                "Silent",
                Arc::new(FnStage::new(|_| StageOutcome::Done)),
                &["trigger"],
                "out",
            )
            .build()
            .unwrap();

        let report = orchestrator
            .run(
                &definition,
                vec![("trigger".to_string(), serde_json::json!("go"))],
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.failing_stage(), Some("Silent"));
    }

    #[tokio::test]
    async fn timeout_is_transient_and_exhausts() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = Orchestrator::new(sink)
            .with_retry(
                RetryPolicy::new()
                    .with_max_attempts(2)
                    .with_base_delay_ms(1)
                    .with_jitter(JitterStrategy::None),
            )
            .with_stage_timeout(Duration::from_millis(20));

        let definition = PipelineBuilder::new("mini")
            .seed_key("trigger")
            .binding(
                crate::pipeline::StageBinding::new(
                    "Slow",
                    Arc::new(crate::testing::SleepStage::new(
                        Duration::from_secs(5),
                        serde_json::json!(1),
                    )),
                )
                .with_inputs(["trigger"])
                .with_output("out"),
            )
            .build()
            .unwrap();

        let report = orchestrator
            .run(
                &definition,
                vec![("trigger".to_string(), serde_json::json!("go"))],
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        let failure = report.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Transient);
        assert_eq!(failure.attempts, 2);
        assert!(failure.message.contains("timed out"));
    }
}
