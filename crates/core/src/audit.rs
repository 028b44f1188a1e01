//! Append-only audit trail.
//!
//! Every state-changing operation emits exactly one structured event; this
//! is the compliance trail and is not skippable. Recording is synchronous,
//! infallible and cheap so it can never block or fail the primary request
//! path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One structured audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub careplan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            timestamp: Utc::now(),
            patient_id: None,
            careplan_id: None,
            actor_id: None,
            details: Value::Null,
        }
    }

    pub fn patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn careplan(mut self, careplan_id: impl Into<String>) -> Self {
        self.careplan_id = Some(careplan_id.into());
        self
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Append-only event sink.
pub trait AuditSink: Send + Sync {
    /// Records one event. Must not block and must not fail.
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured `tracing` records under the
/// `careplan_audit` target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => {
                tracing::info!(target: "careplan_audit", action = %event.action, event = %payload)
            }
            Err(error) => {
                tracing::warn!(target: "careplan_audit", action = %event.action, %error, "audit event could not be serialized")
            }
        }
    }
}

/// Test sink that keeps recorded events in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events in emission order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the recorded action names in emission order.
    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}
