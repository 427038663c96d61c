// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Distributions, account changes, logins and admin reads are appended to a
//! daily JSONL file. Audit writes are best-effort: a failure is logged and
//! never fails the request that triggered it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Distribution events
    GiftDistributed,
    GiftRejected,
    CounterUpdateFailed,
    CountersReconciled,

    // Account events
    UserCreated,

    // Auth events
    LoginSuccess,
    LoginFailure,
    PermissionDenied,

    // Admin events
    AdminAccess,
}

impl AuditEventType {
    /// Wire name, as used in the `eventType` query filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::GiftDistributed => "gift_distributed",
            AuditEventType::GiftRejected => "gift_rejected",
            AuditEventType::CounterUpdateFailed => "counter_update_failed",
            AuditEventType::CountersReconciled => "counters_reconciled",
            AuditEventType::UserCreated => "user_created",
            AuditEventType::LoginSuccess => "login_success",
            AuditEventType::LoginFailure => "login_failure",
            AuditEventType::PermissionDenied => "permission_denied",
            AuditEventType::AdminAccess => "admin_access",
        }
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (enrollment number, user id, ...).
    pub resource_id: Option<String>,
    /// Resource type (enrollment, user, ...).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Log an audit event.
    ///
    /// Events are appended to a daily log file in JSONL format.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let event_json = serde_json::to_string(event).map_err(|e| {
            StorageError::SerializationError(format!("Failed to serialize audit event: {e}"))
        })?;

        self.storage.append_line(&path, &event_json)
    }

    /// Log an event, reporting failures through tracing only.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                event_type = event.event_type.as_str(),
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content_str = String::from_utf8(content).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        let mut events = Vec::new();
        for line in content_str.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(line).map_err(|e| {
                StorageError::SerializationError(format!("Failed to deserialize audit event: {e}"))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Read events for an inclusive date range. Days without a log are skipped.
    pub fn read_events_range(&self, start: NaiveDate, end: NaiveDate) -> StorageResult<Vec<AuditEvent>> {
        let mut all_events = Vec::new();
        let mut current = start;

        while current <= end {
            let date_str = current.format("%Y-%m-%d").to_string();
            match self.read_events(&date_str) {
                Ok(events) => all_events.extend(events),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::SerializationError("Date overflow".to_string()))?;
        }

        Ok(all_events)
    }
}

/// Helper macro for logging audit events.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $user:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type).with_user(&$user.user_id);
        repo.record(event);
    }};
    ($storage:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user(&$user.user_id)
            .with_resource($resource_type, $resource_id);
        repo.record(event);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::GiftDistributed)
            .with_user("user_123")
            .with_resource("enrollment", "E100");

        assert_eq!(event.event_type, AuditEventType::GiftDistributed);
        assert_eq!(event.user_id.as_deref(), Some("user_123"));
        assert_eq!(event.resource_type.as_deref(), Some("enrollment"));
        assert_eq!(event.resource_id.as_deref(), Some("E100"));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::GiftRejected)
            .with_user("user_123")
            .failed("already distributed");

        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("already distributed"));
    }

    #[test]
    fn event_type_names_match_serde() {
        for event_type in [
            AuditEventType::GiftDistributed,
            AuditEventType::CounterUpdateFailed,
            AuditEventType::LoginFailure,
            AuditEventType::AdminAccess,
        ] {
            let json = serde_json::to_string(&event_type).unwrap();
            assert_eq!(json.trim_matches('"'), event_type.as_str());
        }
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(&AuditEvent::new(AuditEventType::LoginSuccess).with_user("u1"))
            .unwrap();
        repo.log(
            &AuditEvent::new(AuditEventType::GiftDistributed)
                .with_user("u1")
                .with_resource("enrollment", "E1"),
        )
        .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = repo.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::LoginSuccess);
        assert_eq!(events[1].event_type, AuditEventType::GiftDistributed);
    }

    #[test]
    fn range_skips_missing_days() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        repo.record(AuditEvent::new(AuditEventType::AdminAccess).with_user("admin"));

        let today = Utc::now().date_naive();
        let week_ago = today - chrono::Duration::days(7);
        let events = repo.read_events_range(week_ago, today).unwrap();

        assert_eq!(events.len(), 1);
    }
}
