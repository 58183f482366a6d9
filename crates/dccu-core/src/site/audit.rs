//! Audit log entries.

use serde::{Deserialize, Serialize};

/// Maximum number of entries retained.
pub const AUDIT_CAPACITY: usize = 200;

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID.
    pub id: String,
    /// Epoch milliseconds when the action happened.
    pub ts: i64,
    /// Codename of the viewer, or `SYSTEM`.
    pub actor: String,
    /// Dotted action name, e.g. `ops.add`.
    pub action: String,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Receiver for audit records.
pub trait AuditSink: Send + Sync {
    /// Record an action.
    fn log(&self, action: &str, details: Option<&str>);
}

/// Audit sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn log(&self, _action: &str, _details: Option<&str>) {}
}

/// Drop the oldest entries so at most [`AUDIT_CAPACITY`] remain.
pub(crate) fn truncate_to_capacity(entries: &mut Vec<AuditEntry>) {
    if entries.len() > AUDIT_CAPACITY {
        let excess = entries.len() - AUDIT_CAPACITY;
        entries.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> AuditEntry {
        AuditEntry {
            id: n.to_string(),
            ts: n as i64,
            actor: "SYSTEM".to_string(),
            action: "test".to_string(),
            details: None,
        }
    }

    #[test]
    fn test_truncate_keeps_newest() {
        let mut entries: Vec<AuditEntry> = (0..250).map(entry).collect();
        truncate_to_capacity(&mut entries);
        assert_eq!(entries.len(), AUDIT_CAPACITY);
        assert_eq!(entries.first().unwrap().id, "50");
        assert_eq!(entries.last().unwrap().id, "249");
    }

    #[test]
    fn test_details_omitted_when_absent() {
        let json = serde_json::to_value(entry(1)).unwrap();
        assert!(json.get("details").is_none());
    }
}
