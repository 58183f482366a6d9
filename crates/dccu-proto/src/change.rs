//! Push-change notifications.
//!
//! A change event only says that something in a table changed. Consumers
//! react by refetching; they never rely on the event payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::TableName;

/// Types of changes that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeType {
    /// Parse the backend's change type name (`INSERT`, `UPDATE`, `DELETE`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeType::Insert),
            "UPDATE" => Some(ChangeType::Update),
            "DELETE" => Some(ChangeType::Delete),
            _ => None,
        }
    }
}

/// A change notification for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table that changed.
    pub table: TableName,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Commit time reported by the backend, if any.
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    /// Create a change event stamped with no commit time.
    pub fn new(table: TableName, change_type: ChangeType) -> Self {
        Self {
            table,
            change_type,
            commit_timestamp: None,
        }
    }

    /// Set the commit timestamp.
    pub fn with_commit_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.commit_timestamp = Some(ts);
        self
    }
}
