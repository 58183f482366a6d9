//! Backend boundary.
//!
//! A backend stores rows by table name and announces changes. Rows cross the
//! boundary as raw JSON so the clearance filter can run before decoding.

mod memory;
pub mod realtime;
mod supabase;

pub use memory::MemoryBackend;
pub use supabase::SupabaseBackend;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use dccu_proto::{ChangeEvent, TableName};

use crate::error::BackendResult;

/// Hosted relational store reachable by table name.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// All rows of a table, newest `created_at` first.
    async fn select_all(&self, table: TableName) -> BackendResult<Vec<Value>>;

    /// Insert a row and return it as stored.
    async fn insert(&self, table: TableName, draft: Value) -> BackendResult<Value>;

    /// Apply a partial update to the row with `id` and return it as stored.
    async fn update(&self, table: TableName, id: &str, patch: Value) -> BackendResult<Value>;

    /// Delete the row with `id`.
    async fn delete(&self, table: TableName, id: &str) -> BackendResult<()>;

    /// Open a push-change channel for a table.
    async fn subscribe(&self, table: TableName) -> BackendResult<ChangeFeed>;
}

/// Receiving end of a push-change channel.
///
/// Dropping the feed tears the channel down.
#[derive(Debug)]
pub struct ChangeFeed {
    table: TableName,
    events: mpsc::Receiver<ChangeEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ChangeFeed {
    /// Wrap a receiver, with an optional signal fired on teardown.
    pub fn new(
        table: TableName,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            table,
            events,
            shutdown,
        }
    }

    /// Create a feed together with the sender that drives it.
    pub fn channel(table: TableName, capacity: usize) -> (mpsc::Sender<ChangeEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(table, rx, None))
    }

    /// Table the feed watches.
    pub fn table(&self) -> TableName {
        self.table
    }

    /// Channel name, e.g. `movies_changes`.
    pub fn channel_name(&self) -> String {
        self.table.channel_name()
    }

    /// Wait for the next change. Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Tear the channel down.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
