//! Ops task board.
//!
//! A kanban-style list of tasks kept entirely in local storage. Every
//! mutation rewrites the whole list and reports to the audit sink.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, Error};
use crate::site::AuditSink;
use crate::storage::{generate_id, load_json, now_millis, save_json, KvStore};

/// Storage key for ops tasks.
pub const OPS_KEY: &str = "bat_ops_tasks_v1";

/// Board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpsStatus {
    Backlog,
    Active,
    Blocked,
    Done,
}

impl OpsStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            OpsStatus::Backlog => "backlog",
            OpsStatus::Active => "active",
            OpsStatus::Blocked => "blocked",
            OpsStatus::Done => "done",
        }
    }
}

impl fmt::Display for OpsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpsStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backlog" => Ok(OpsStatus::Backlog),
            "active" => Ok(OpsStatus::Active),
            "blocked" => Ok(OpsStatus::Blocked),
            "done" => Ok(OpsStatus::Done),
            _ => Err(Error::InvalidData(format!("unknown ops status '{}'", s))),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpsPriority {
    Low,
    Medium,
    High,
}

impl fmt::Display for OpsPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpsPriority::Low => "low",
            OpsPriority::Medium => "medium",
            OpsPriority::High => "high",
        })
    }
}

impl FromStr for OpsPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(OpsPriority::Low),
            "medium" => Ok(OpsPriority::Medium),
            "high" => Ok(OpsPriority::High),
            _ => Err(Error::InvalidData(format!("unknown ops priority '{}'", s))),
        }
    }
}

/// A task on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsTask {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub status: OpsStatus,
    pub priority: OpsPriority,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Fields supplied when creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOpsTask {
    pub title: String,
    pub detail: Option<String>,
    pub status: OpsStatus,
    pub priority: OpsPriority,
}

impl NewOpsTask {
    /// A backlog task at medium priority.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: None,
            status: OpsStatus::Backlog,
            priority: OpsPriority::Medium,
        }
    }

    /// Set the detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: OpsStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: OpsPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// The ops board.
pub struct OpsBoard {
    store: Arc<dyn KvStore>,
    audit: Arc<dyn AuditSink>,
    tasks: RwLock<Vec<OpsTask>>,
}

impl OpsBoard {
    /// Load the board from the store.
    pub fn open(store: Arc<dyn KvStore>, audit: Arc<dyn AuditSink>) -> Self {
        let tasks: Vec<OpsTask> = load_json(store.as_ref(), OPS_KEY);
        Self {
            store,
            audit,
            tasks: RwLock::new(tasks),
        }
    }

    /// All tasks in creation order.
    pub fn tasks(&self) -> Vec<OpsTask> {
        self.tasks.read().clone()
    }

    /// Tasks in one column.
    pub fn tasks_with_status(&self, status: OpsStatus) -> Vec<OpsTask> {
        self.tasks
            .read()
            .iter()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Append a new task.
    pub fn add(&self, draft: NewOpsTask) -> CoreResult<OpsTask> {
        let now = now_millis();
        let task = OpsTask {
            id: generate_id(),
            title: draft.title,
            detail: draft.detail,
            status: draft.status,
            priority: draft.priority,
            created_at: now,
            updated_at: now,
        };

        self.mutate(|tasks| tasks.push(task.clone()))?;
        self.audit.log("ops.add", Some(&task.title));
        Ok(task)
    }

    /// Replace a task by id, stamping its update time.
    pub fn update(&self, task: OpsTask) -> CoreResult<()> {
        let title = task.title.clone();
        self.mutate(|tasks| {
            if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
                *slot = OpsTask {
                    updated_at: now_millis(),
                    ..task
                };
            }
        })?;
        self.audit.log("ops.update", Some(&title));
        Ok(())
    }

    /// Remove a task by id.
    pub fn remove(&self, id: &str) -> CoreResult<()> {
        self.mutate(|tasks| tasks.retain(|t| t.id != id))?;
        self.audit.log("ops.remove", Some(id));
        Ok(())
    }

    /// Move a task to another column.
    pub fn move_task(&self, id: &str, status: OpsStatus) -> CoreResult<()> {
        self.mutate(|tasks| {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.status = status;
                task.updated_at = now_millis();
            }
        })?;
        self.audit
            .log("ops.move", Some(&format!("{} -> {}", id, status)));
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Vec<OpsTask>),
    {
        let snapshot = {
            let mut tasks = self.tasks.write();
            f(&mut tasks);
            tasks.clone()
        };
        save_json(self.store.as_ref(), OPS_KEY, &snapshot)
    }
}
