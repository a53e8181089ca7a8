//! Audit sink adapters for the durable store.
//!
//! A sink persists finalized `RunRecord`s and must be idempotent under
//! retry: persisting the same run id twice upserts rather than
//! duplicating. Persistence failure is reported to the caller but never
//! escalated to a process-fatal error.

use crate::core::RunRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Error from a persistence attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditError {
    /// The durable store was unreachable or overloaded; retryable.
    #[error("Audit store unavailable: {0}")]
    Unavailable(String),

    /// The record could not be serialized or the store rejected it.
    #[error("Audit write rejected: {0}")]
    Rejected(String),
}

/// Acknowledgement of a persisted run record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditAck {
    /// The persisted run id.
    pub run_id: Uuid,
    /// When the record was stored (UTC).
    pub stored_at: DateTime<Utc>,
    /// The stored record's content digest.
    pub digest: String,
}

/// The durable store receiving finalized run records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists a run record, upserting by run id.
    async fn persist(&self, record: &RunRecord) -> Result<AuditAck, AuditError>;
}

fn ack_for(record: &RunRecord) -> AuditAck {
    AuditAck {
        run_id: record.run_id,
        stored_at: Utc::now(),
        digest: record.digest.clone(),
    }
}

/// In-memory audit sink backed by a concurrent upsert map.
///
/// The reference implementation for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: DashMap<Uuid, RunRecord>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored record for a run id, if any.
    #[must_use]
    pub fn get(&self, run_id: Uuid) -> Option<RunRecord> {
        self.records.get(&run_id).map(|r| r.clone())
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn persist(&self, record: &RunRecord) -> Result<AuditAck, AuditError> {
        self.records.insert(record.run_id, record.clone());
        Ok(ack_for(record))
    }
}

/// File-backed audit sink holding one JSON document of records keyed by
/// run id.
///
/// The whole document is rewritten on every persist; re-persisting a run
/// id replaces its record in place. File IO runs on the blocking thread
/// pool so a slow disk never stalls the runtime.
#[derive(Debug)]
pub struct JsonFileAuditSink {
    path: PathBuf,
    lock: Arc<parking_lot::Mutex<()>>,
}

impl JsonFileAuditSink {
    /// Creates a sink writing to the given path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Arc::new(parking_lot::Mutex::new(())),
        }
    }

    /// Loads all stored records.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Rejected` if the document cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<HashMap<Uuid, RunRecord>, AuditError> {
        load_records(&self.path)
    }
}

fn load_records(path: &Path) -> Result<HashMap<Uuid, RunRecord>, AuditError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| AuditError::Rejected(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| AuditError::Rejected(format!("parse {}: {e}", path.display())))
}

fn store_records(path: &Path, records: &HashMap<Uuid, RunRecord>) -> Result<(), AuditError> {
    let text = serde_json::to_string_pretty(records)
        .map_err(|e| AuditError::Rejected(format!("serialize records: {e}")))?;
    std::fs::write(path, text)
        .map_err(|e| AuditError::Unavailable(format!("write {}: {e}", path.display())))
}

#[async_trait]
impl AuditSink for JsonFileAuditSink {
    async fn persist(&self, record: &RunRecord) -> Result<AuditAck, AuditError> {
        let path = self.path.clone();
        let lock = self.lock.clone();
        let record = record.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            let mut records = load_records(&path)?;
            records.insert(record.run_id, record.clone());
            store_records(&path, &records)?;
            Ok(ack_for(&record))
        })
        .await
        .map_err(|e| AuditError::Unavailable(format!("persist task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSnapshot, RunIdentity};
    use crate::core::RunStatus;

    fn record(identity: &RunIdentity, status: RunStatus) -> RunRecord {
        RunRecord::new(
            identity,
            status,
            ContextSnapshot::from_entries(vec![(
                "trigger".to_string(),
                serde_json::json!("check pricing"),
            )]),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn memory_sink_stores_and_acks() {
        let sink = MemoryAuditSink::new();
        let identity = RunIdentity::new("council");
        let rec = record(&identity, RunStatus::Succeeded);

        let ack = sink.persist(&rec).await.unwrap();
        assert_eq!(ack.run_id, identity.run_id);
        assert_eq!(ack.digest, rec.digest);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn memory_sink_upserts_by_run_id() {
        let sink = MemoryAuditSink::new();
        let identity = RunIdentity::new("council");

        sink.persist(&record(&identity, RunStatus::Failed)).await.unwrap();
        sink.persist(&record(&identity, RunStatus::Succeeded)).await.unwrap();

        assert_eq!(sink.len(), 1);
        let stored = sink.get(identity.run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn file_sink_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileAuditSink::new(dir.path().join("audit.json"));
        let identity = RunIdentity::new("council");
        let rec = record(&identity, RunStatus::Succeeded);

        sink.persist(&rec).await.unwrap();

        let records = sink.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[&identity.run_id], rec);
    }

    #[tokio::test]
    async fn file_sink_upserts_by_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileAuditSink::new(dir.path().join("audit.json"));
        let identity = RunIdentity::new("council");

        sink.persist(&record(&identity, RunStatus::Failed)).await.unwrap();
        sink.persist(&record(&identity, RunStatus::Succeeded)).await.unwrap();

        let records = sink.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[&identity.run_id].status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn file_sink_serializes_concurrent_persists() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonFileAuditSink::new(dir.path().join("audit.json")));

        let a = RunIdentity::new("council");
        let b = RunIdentity::new("council");
        let rec_a = record(&a, RunStatus::Succeeded);
        let rec_b = record(&b, RunStatus::Failed);
        let (ra, rb) = tokio::join!(sink.persist(&rec_a), sink.persist(&rec_b));
        ra.unwrap();
        rb.unwrap();

        // Neither whole-document rewrite may clobber the other.
        let records = sink.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains_key(&a.run_id));
        assert!(records.contains_key(&b.run_id));
    }

    #[tokio::test]
    async fn file_sink_separate_runs_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileAuditSink::new(dir.path().join("audit.json"));

        let a = RunIdentity::new("council");
        let b = RunIdentity::new("council");
        sink.persist(&record(&a, RunStatus::Succeeded)).await.unwrap();
        sink.persist(&record(&b, RunStatus::Failed)).await.unwrap();

        assert_eq!(sink.load().unwrap().len(), 2);
    }
}
