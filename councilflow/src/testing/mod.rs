//! Test doubles for the external collaborators.
//!
//! Scripted providers in the same spirit as production seams: useful in
//! this crate's own tests and for downstream consumers wiring pipelines
//! without live services.

use crate::audit::{AuditAck, AuditError, AuditSink};
use crate::core::{RunRecord, StageOutcome};
use crate::providers::{
    ProviderError, ReasoningRequest, ReasoningResponse, ReasoningService, SourceDataService,
    SourceQuery,
};
use crate::stages::{Stage, StageInputs};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A reasoning service that replays a fixed script of responses.
#[derive(Debug, Default)]
pub struct ScriptedReasoningService {
    script: Mutex<VecDeque<Result<serde_json::Value, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedReasoningService {
    /// Creates a service replaying the given script in order.
    #[must_use]
    pub fn new(script: Vec<Result<serde_json::Value, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a service returning the given values in order.
    #[must_use]
    pub fn with_values(values: Vec<serde_json::Value>) -> Self {
        Self::new(values.into_iter().map(Ok).collect())
    }

    /// Creates a service returning the given errors in order.
    #[must_use]
    pub fn with_errors(errors: Vec<ProviderError>) -> Self {
        Self::new(errors.into_iter().map(Err).collect())
    }

    /// Returns how many times the service was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns all prompts received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Returns the most recent prompt received.
    #[must_use]
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoningService {
    async fn complete(
        &self,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        match self.script.lock().pop_front() {
            Some(Ok(value)) => Ok(ReasoningResponse::new(value, request.model)),
            Some(Err(err)) => Err(err),
            None => Err(ProviderError::Permanent("script exhausted".to_string())),
        }
    }
}

/// A reasoning service that fails transiently N times, then succeeds.
#[derive(Debug)]
pub struct FlakyReasoningService {
    remaining_failures: AtomicUsize,
    value: serde_json::Value,
    calls: AtomicUsize,
}

impl FlakyReasoningService {
    /// Creates a service failing `failures` times before returning
    /// `value` on every later call.
    #[must_use]
    pub fn new(failures: usize, value: serde_json::Value) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
            value,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the service was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningService for FlakyReasoningService {
    async fn complete(
        &self,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Transient(format!(
                "upstream timeout ({remaining} failure(s) left)"
            )));
        }
        Ok(ReasoningResponse::new(self.value.clone(), request.model))
    }
}

/// A source-data service replaying a fixed record list, or failing.
#[derive(Debug)]
pub struct ScriptedSourceData {
    records: Vec<serde_json::Value>,
    error: Option<ProviderError>,
    calls: AtomicUsize,
}

impl ScriptedSourceData {
    /// Creates a service returning the given records on every query.
    #[must_use]
    pub fn new(records: Vec<serde_json::Value>) -> Self {
        Self {
            records,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a service failing every query with the given error.
    #[must_use]
    pub fn failing(error: ProviderError) -> Self {
        Self {
            records: Vec::new(),
            error: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the service was queried.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceDataService for ScriptedSourceData {
    async fn query(&self, _query: SourceQuery) -> Result<Vec<serde_json::Value>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.records.clone()),
        }
    }
}

/// An audit sink that rejects every persist attempt.
#[derive(Debug)]
pub struct FailingAuditSink {
    error: AuditError,
    calls: AtomicUsize,
}

impl FailingAuditSink {
    /// Creates a sink failing with `AuditError::Unavailable`.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            error: AuditError::Unavailable(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a sink failing with `AuditError::Rejected`.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            error: AuditError::Rejected(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many persist attempts were made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn persist(&self, _record: &RunRecord) -> Result<AuditAck, AuditError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// A stage that sleeps before returning a fixed value; exercises the
/// orchestrator's per-stage time budget.
#[derive(Debug)]
pub struct SleepStage {
    delay: Duration,
    value: serde_json::Value,
}

impl SleepStage {
    /// Creates a stage sleeping `delay` then returning `value`.
    #[must_use]
    pub fn new(delay: Duration, value: serde_json::Value) -> Self {
        Self { delay, value }
    }
}

#[async_trait]
impl Stage for SleepStage {
    async fn invoke(&self, _inputs: &StageInputs) -> StageOutcome {
        tokio::time::sleep(self.delay).await;
        StageOutcome::value(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_service_replays_in_order() {
        let service = ScriptedReasoningService::with_values(vec![
            serde_json::json!("first"),
            serde_json::json!("second"),
        ]);

        let a = service
            .complete(ReasoningRequest::new("p1", "m"))
            .await
            .unwrap();
        let b = service
            .complete(ReasoningRequest::new("p2", "m"))
            .await
            .unwrap();

        assert_eq!(a.value, serde_json::json!("first"));
        assert_eq!(b.value, serde_json::json!("second"));
        assert_eq!(service.prompts(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn scripted_service_exhaustion_is_permanent() {
        let service = ScriptedReasoningService::with_values(vec![]);
        let err = service
            .complete(ReasoningRequest::new("p", "m"))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn flaky_service_recovers() {
        let service = FlakyReasoningService::new(2, serde_json::json!("ok"));

        assert!(service.complete(ReasoningRequest::new("p", "m")).await.is_err());
        assert!(service.complete(ReasoningRequest::new("p", "m")).await.is_err());
        let response = service.complete(ReasoningRequest::new("p", "m")).await.unwrap();

        assert_eq!(response.value, serde_json::json!("ok"));
        assert_eq!(service.call_count(), 3);
    }
}
