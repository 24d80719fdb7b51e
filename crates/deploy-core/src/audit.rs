//! Structured audit events emitted over a deployment's lifecycle
//!
//! Sinks are fire-and-forget: a sink never fails the deployment.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use deploy_meta::Platform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventKind {
    SessionStarted,
    StateChanged,
    ValidationFailed,
    SecurityBlocked,
    ComponentQuarantined,
    BackupCreated,
    FileWritten,
    FileSkipped,
    DecisionDeferred,
    WriteFailed,
    RollbackCompleted,
    SessionCompleted,
    SessionFailed,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session-started",
            Self::StateChanged => "state-changed",
            Self::ValidationFailed => "validation-failed",
            Self::SecurityBlocked => "security-blocked",
            Self::ComponentQuarantined => "component-quarantined",
            Self::BackupCreated => "backup-created",
            Self::FileWritten => "file-written",
            Self::FileSkipped => "file-skipped",
            Self::DecisionDeferred => "decision-deferred",
            Self::WriteFailed => "write-failed",
            Self::RollbackCompleted => "rollback-completed",
            Self::SessionCompleted => "session-completed",
            Self::SessionFailed => "session-failed",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub session_id: String,
    pub platform: Platform,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, session_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            platform,
            at: Utc::now(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.detail.insert(key.into(), value.to_string());
        self
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Forwards events to `tracing` under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            kind = %event.kind,
            session = %event.session_id,
            platform = %event.platform,
            detail = ?event.detail,
            "Audit event"
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<AuditEventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
