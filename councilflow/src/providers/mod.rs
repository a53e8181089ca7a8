//! Trait seams for the external collaborators: the generative reasoning
//! service and the source-data query service.
//!
//! The orchestrator only ever sends these a request and receives a
//! response; how an advisor decides what to say is policy behind the
//! seam, not architecture in front of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error from an external service call, classified for the retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// A retryable hiccup (timeout, rate limiting, transient overload).
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// An unrecoverable rejection (invalid request, refusal).
    #[error("Permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    /// Returns true if the error is retryable.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A request to the generative reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningRequest {
    /// The fully interpolated prompt/instructions.
    pub prompt: String,
    /// The model to use.
    pub model: String,
    /// The resolved context values the prompt references, by key.
    pub inputs: HashMap<String, serde_json::Value>,
}

impl ReasoningRequest {
    /// Creates a new reasoning request.
    #[must_use]
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            inputs: HashMap::new(),
        }
    }

    /// Attaches the resolved input values.
    #[must_use]
    pub fn with_inputs(mut self, inputs: HashMap<String, serde_json::Value>) -> Self {
        self.inputs = inputs;
        self
    }
}

/// A response from the generative reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningResponse {
    /// The produced value: text or structured data.
    pub value: serde_json::Value,
    /// The model that produced it.
    pub model: String,
    /// Service-side latency, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ReasoningResponse {
    /// Creates a response carrying a value.
    #[must_use]
    pub fn new(value: serde_json::Value, model: impl Into<String>) -> Self {
        Self {
            value,
            model: model.into(),
            latency_ms: None,
        }
    }
}

/// The generative reasoning service consumed by advisor stages.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Produces a value for the given prompt.
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ProviderError>;
}

/// A query against the source-data service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceQuery {
    /// Named query parameters.
    pub params: HashMap<String, serde_json::Value>,
}

impl SourceQuery {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// The source-data query service that supplies the initial facts a
/// pipeline reasons over.
#[async_trait]
pub trait SourceDataService: Send + Sync {
    /// Runs a query and returns an ordered list of records.
    async fn query(&self, query: SourceQuery) -> Result<Vec<serde_json::Value>, ProviderError>;
}
