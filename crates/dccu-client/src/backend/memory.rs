//! In-process backend.
//!
//! Tables are plain vectors of JSON rows. The backend assigns ids and
//! timestamps the way the hosted one does and fans change events out to every
//! open feed. Call counters, injected failures and per-call select delays let
//! tests observe and steer the view on top of it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use dccu_core::storage::generate_id;
use dccu_proto::{ChangeEvent, ChangeType, TableName, CREATED_AT_FIELD, UPDATED_AT_FIELD};

use super::{Backend, ChangeFeed};
use crate::error::{BackendError, BackendResult};

const FEED_CAPACITY: usize = 64;

/// Backend that keeps every table in memory.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<TableName, Vec<Value>>>,
    subscribers: Mutex<HashMap<TableName, Vec<mpsc::Sender<ChangeEvent>>>>,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
    select_delays: Mutex<VecDeque<Duration>>,
    select_failure: Mutex<Option<String>>,
    mutation_failure: Mutex<Option<String>>,
    subscribe_failure: Mutex<Option<String>>,
    select_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row directly, without counting a call or notifying feeds.
    ///
    /// Missing `id`, `created_at` and `updated_at` fields are filled in.
    pub fn seed(&self, table: TableName, row: Value) -> Value {
        let mut row = match row {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let stamp = self.next_stamp();
        row.entry("id").or_insert_with(|| Value::String(generate_id()));
        row.entry(CREATED_AT_FIELD)
            .or_insert_with(|| Value::String(stamp.clone()));
        row.entry(UPDATED_AT_FIELD)
            .or_insert_with(|| Value::String(stamp));

        let row = Value::Object(row);
        self.tables.lock().entry(table).or_default().push(row.clone());
        row
    }

    /// Rows of a table as stored, newest first.
    pub fn rows(&self, table: TableName) -> Vec<Value> {
        let mut rows = self.tables.lock().get(&table).cloned().unwrap_or_default();
        sort_newest_first(&mut rows);
        rows
    }

    /// Announce a change on a table without touching its rows.
    pub fn publish(&self, table: TableName, change_type: ChangeType) {
        let event = ChangeEvent::new(table, change_type).with_commit_timestamp(Utc::now());
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(&table) {
            senders.retain(|tx| !tx.is_closed());
            for tx in senders.iter() {
                if tx.try_send(event.clone()).is_err() {
                    tracing::debug!(table = %table, "change feed full, dropping event");
                }
            }
        }
    }

    /// Delay the next select by `delay`. Delays queue up, one per call.
    pub fn push_select_delay(&self, delay: Duration) {
        self.select_delays.lock().push_back(delay);
    }

    /// Fail the next select with a transport error.
    pub fn fail_next_select(&self, message: impl Into<String>) {
        *self.select_failure.lock() = Some(message.into());
    }

    /// Fail the next insert, update or delete with a transport error.
    pub fn fail_next_mutation(&self, message: impl Into<String>) {
        *self.mutation_failure.lock() = Some(message.into());
    }

    /// Fail the next subscribe.
    pub fn fail_next_subscribe(&self, message: impl Into<String>) {
        *self.subscribe_failure.lock() = Some(message.into());
    }

    /// Number of selects issued.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of inserts, updates and deletes issued.
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    /// Number of subscribes issued.
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of feeds still open on a table.
    pub fn subscriber_count(&self, table: TableName) -> usize {
        let mut subscribers = self.subscribers.lock();
        match subscribers.get_mut(&table) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    /// A timestamp strictly later than every one handed out before.
    fn next_stamp(&self) -> String {
        let mut last = self.last_stamp.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + chrono::Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn begin_mutation(&self) -> BackendResult<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        match self.mutation_failure.lock().take() {
            Some(message) => Err(BackendError::Transport(message)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("tables", &self.tables.lock().len())
            .field("select_calls", &self.select_calls())
            .field("mutation_calls", &self.mutation_calls())
            .finish()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select_all(&self, table: TableName) -> BackendResult<Vec<Value>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.select_failure.lock().take() {
            return Err(BackendError::Transport(message));
        }

        // Read at call time; a delayed response returns this snapshot.
        let rows = self.rows(table);
        let delay = self.select_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(rows)
    }

    async fn insert(&self, table: TableName, draft: Value) -> BackendResult<Value> {
        self.begin_mutation()?;
        let Value::Object(mut row) = draft else {
            return Err(BackendError::Decode("insert payload must be an object".to_string()));
        };

        let stamp = self.next_stamp();
        row.insert("id".to_string(), Value::String(generate_id()));
        row.insert(CREATED_AT_FIELD.to_string(), Value::String(stamp.clone()));
        row.insert(UPDATED_AT_FIELD.to_string(), Value::String(stamp));

        let row = Value::Object(row);
        self.tables.lock().entry(table).or_default().push(row.clone());
        self.publish(table, ChangeType::Insert);
        Ok(row)
    }

    async fn update(&self, table: TableName, id: &str, patch: Value) -> BackendResult<Value> {
        self.begin_mutation()?;
        let Value::Object(patch) = patch else {
            return Err(BackendError::Decode("update payload must be an object".to_string()));
        };

        let updated = {
            let mut tables = self.tables.lock();
            let row = tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|r| r.get("id").and_then(Value::as_str) == Some(id)))
                .ok_or(BackendError::NotFound)?;

            if let Value::Object(fields) = row {
                let stamped = patch.contains_key(UPDATED_AT_FIELD);
                for (key, value) in patch {
                    if key != "id" && key != CREATED_AT_FIELD {
                        fields.insert(key, value);
                    }
                }
                if !stamped {
                    fields.insert(UPDATED_AT_FIELD.to_string(), Value::String(self.next_stamp()));
                }
            }
            row.clone()
        };

        self.publish(table, ChangeType::Update);
        Ok(updated)
    }

    async fn delete(&self, table: TableName, id: &str) -> BackendResult<()> {
        self.begin_mutation()?;
        let removed = {
            let mut tables = self.tables.lock();
            match tables.get_mut(&table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
                    rows.len() != before
                }
                None => false,
            }
        };

        if removed {
            self.publish(table, ChangeType::Delete);
        }
        Ok(())
    }

    async fn subscribe(&self, table: TableName) -> BackendResult<ChangeFeed> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.subscribe_failure.lock().take() {
            return Err(BackendError::Subscription(message));
        }

        let (tx, feed) = ChangeFeed::channel(table, FEED_CAPACITY);
        self.subscribers.lock().entry(table).or_default().push(tx);

        tracing::debug!(
            table = %table,
            subscription = %feed.channel_name(),
            "subscription created"
        );

        Ok(feed)
    }
}

fn created_at(row: &Value) -> Option<DateTime<Utc>> {
    row.get(CREATED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn sort_newest_first(rows: &mut [Value]) {
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}
