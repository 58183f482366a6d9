//! Clearance-filtered table view.
//!
//! A [`TableView`] keeps the rows of one table that the current viewer may
//! see and refreshes them whenever the backend reports a change.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --fetch--> Loading --+--> Ready
//!                           +--> Errored
//! any --unmount--> Unmounted
//! ```
//!
//! Every explicit fetch, every session or table change and every push
//! notification re-enters `Loading`. Overlapping fetches are not coalesced:
//! the response that resolves last wins, and `loading` stays set until every
//! in-flight fetch has resolved.
//!
//! Writes require ALPHA and are rejected before the backend is called. After
//! a successful write the local rows are patched in place without refiltering.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dccu_core::{filter_visible, ViewerContext};
use dccu_proto::{Entity, Record, Row, Session, TableName, UPDATED_AT_FIELD};

use crate::backend::{Backend, ChangeFeed};
use crate::error::{ClientResult, Error};

/// Where a view is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    /// Nothing fetched yet.
    Idle,
    /// At least one fetch is in flight.
    Loading,
    /// The last fetch to resolve succeeded.
    Ready,
    /// The last fetch to resolve failed.
    Errored,
    /// The view was unmounted; results are discarded.
    Unmounted,
}

/// Observable state of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot<R> {
    /// Visible rows, newest first.
    pub rows: Vec<R>,
    /// Whether any fetch is in flight.
    pub loading: bool,
    /// Message of the most recent failed fetch.
    pub error: Option<String>,
    /// Message of the most recent failed subscribe.
    pub subscription_error: Option<String>,
    /// Lifecycle phase.
    pub phase: ViewPhase,
}

impl<R> Default for ViewSnapshot<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            loading: false,
            error: None,
            subscription_error: None,
            phase: ViewPhase::Idle,
        }
    }
}

/// Per-table, clearance-filtered, mutable view of backend rows.
pub struct TableView<R: Record, B: Backend> {
    inner: Arc<ViewInner<R, B>>,
}

impl<R: Record, B: Backend> Clone for TableView<R, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Entity, B: Backend> TableView<R, B> {
    /// Create a view over the entity's table.
    pub fn new(backend: Arc<B>, session: Option<Session>) -> Self {
        Self::with_table(backend, R::TABLE, session)
    }
}

impl<B: Backend> TableView<Row, B> {
    /// Create an untyped view over any table.
    pub fn for_table(backend: Arc<B>, table: TableName, session: Option<Session>) -> Self {
        Self::with_table(backend, table, session)
    }

    /// Point the view at another table.
    ///
    /// A mounted view resubscribes and refetches, as on a session change.
    pub async fn set_table(&self, table: TableName) -> ClientResult<()> {
        {
            let mut current = self.inner.table.lock();
            if *current == table {
                return Ok(());
            }
            *current = table;
        }
        self.inner.state.send_modify(|s| s.rows.clear());
        self.inner.refresh().await
    }
}

impl<R: Record, B: Backend> TableView<R, B> {
    fn with_table(backend: Arc<B>, table: TableName, session: Option<Session>) -> Self {
        let (state, _) = watch::channel(ViewSnapshot::default());
        Self {
            inner: Arc::new(ViewInner {
                backend,
                table: Mutex::new(table),
                viewer: RwLock::new(ViewerContext::new(session)),
                state,
                in_flight: AtomicUsize::new(0),
                session_epoch: AtomicU64::new(0),
                mounted: AtomicBool::new(false),
                unmounted: AtomicBool::new(false),
                listener: Mutex::new(None),
                _record: PhantomData,
            }),
        }
    }

    /// Table the view reads.
    pub fn table(&self) -> TableName {
        *self.inner.table.lock()
    }

    /// Current viewer.
    pub fn viewer(&self) -> ViewerContext {
        self.inner.viewer.read().clone()
    }

    /// Whether the viewer may insert, update or delete.
    pub fn can_modify(&self) -> bool {
        self.inner.viewer.read().can_modify()
    }

    /// Start the view: subscribe to changes and fetch.
    ///
    /// Without a session nothing happens and the view stays idle.
    pub async fn mount(&self) -> ClientResult<()> {
        if self.inner.unmounted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.mounted.store(true, Ordering::SeqCst);
        self.inner.refresh().await
    }

    /// Replace the session.
    ///
    /// A mounted view tears down its subscription, then resubscribes and
    /// refetches under the new session. Rows the new viewer may not see are
    /// dropped at once, so a failed refetch never exposes them. Signing out
    /// clears the rows, and fetches still in flight are discarded.
    pub async fn set_session(&self, session: Option<Session>) -> ClientResult<()> {
        let signed_out = session.is_none();
        let viewer = ViewerContext::new(session);
        *self.inner.viewer.write() = viewer.clone();
        self.inner.session_epoch.fetch_add(1, Ordering::SeqCst);

        if signed_out {
            self.inner.release_subscription();
            self.inner.state.send_if_modified(|s| {
                if s.phase == ViewPhase::Unmounted {
                    return false;
                }
                s.rows.clear();
                s.error = None;
                s.phase = ViewPhase::Idle;
                true
            });
            return Ok(());
        }

        self.inner.state.send_if_modified(|s| {
            let before = s.rows.len();
            s.rows.retain(|row| visible_to(&viewer, row));
            s.rows.len() != before
        });

        self.inner.refresh().await
    }

    /// Stop the view and release its subscription.
    ///
    /// Fetches already in flight still run, but their results are dropped.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// Fetch all rows and keep those the viewer may see.
    ///
    /// With no session the viewer is treated as DELTA.
    pub async fn fetch(&self) -> ClientResult<()> {
        self.inner.fetch().await
    }

    /// Insert a row and prepend it to the visible rows.
    pub async fn insert(&self, draft: &R::Draft) -> ClientResult<R> {
        self.inner.viewer.read().require_modify("insert")?;

        let payload = serde_json::to_value(draft).map_err(dccu_proto::Error::from)?;
        let table = self.table();
        let stored = self
            .inner
            .backend
            .insert(table, payload)
            .await
            .map_err(|e| Error::backend("insert", e))?;
        let record = R::from_value(stored)?;

        tracing::debug!(table = %table, id = record.id(), "row inserted");

        let row = record.clone();
        self.inner.modify_rows(move |rows| rows.insert(0, row));
        Ok(record)
    }

    /// Apply a partial update and replace the matching visible row.
    ///
    /// The patch is sent with a fresh `updated_at`. The replaced row is not
    /// refiltered.
    pub async fn update(&self, id: &str, patch: &R::Patch) -> ClientResult<R> {
        self.inner.viewer.read().require_modify("update")?;

        let mut payload = match serde_json::to_value(patch).map_err(dccu_proto::Error::from)? {
            Value::Object(map) => map,
            _ => {
                return Err(Error::Decode(dccu_proto::Error::Decode(
                    "update patch must serialize to an object".to_string(),
                )))
            }
        };
        payload.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let table = self.table();
        let stored = self
            .inner
            .backend
            .update(table, id, Value::Object(payload))
            .await
            .map_err(|e| Error::backend("update", e))?;
        let record = R::from_value(stored)?;

        tracing::debug!(table = %table, id, "row updated");

        let row = record.clone();
        let id = id.to_string();
        self.inner.modify_rows(move |rows| {
            for slot in rows.iter_mut().filter(|r| r.id() == id) {
                *slot = row.clone();
            }
        });
        Ok(record)
    }

    /// Delete a row and drop it from the visible rows.
    pub async fn remove(&self, id: &str) -> ClientResult<()> {
        self.inner.viewer.read().require_modify("delete")?;

        let table = self.table();
        self.inner
            .backend
            .delete(table, id)
            .await
            .map_err(|e| Error::backend("delete", e))?;

        tracing::debug!(table = %table, id, "row deleted");

        let id = id.to_string();
        self.inner.modify_rows(move |rows| rows.retain(|r| r.id() != id));
        Ok(())
    }

    /// Watch the view's state.
    pub fn subscribe_state(&self) -> watch::Receiver<ViewSnapshot<R>> {
        self.inner.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ViewSnapshot<R> {
        self.inner.state.borrow().clone()
    }

    /// Copy of the visible rows.
    pub fn rows(&self) -> Vec<R> {
        self.inner.state.borrow().rows.clone()
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Message of the most recent failed fetch.
    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// Whether a push subscription is currently held.
    pub fn is_subscribed(&self) -> bool {
        self.inner.listener.lock().is_some()
    }
}

impl<R: Record, B: Backend> std::fmt::Debug for TableView<R, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("TableView")
            .field("table", &self.table())
            .field("level", &self.inner.viewer.read().level())
            .field("rows", &state.rows.len())
            .field("phase", &state.phase)
            .finish()
    }
}

struct ViewInner<R: Record, B: Backend> {
    backend: Arc<B>,
    table: Mutex<TableName>,
    viewer: RwLock<ViewerContext>,
    state: watch::Sender<ViewSnapshot<R>>,
    in_flight: AtomicUsize,
    /// Bumped on every session change.
    session_epoch: AtomicU64,
    mounted: AtomicBool,
    unmounted: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, B: Backend> ViewInner<R, B> {
    /// Resubscribe and refetch if the view is mounted and has a session.
    async fn refresh(self: &Arc<Self>) -> ClientResult<()> {
        if !self.mounted.load(Ordering::SeqCst) || self.unmounted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.release_subscription();
        if !self.viewer.read().has_session() {
            return Ok(());
        }

        self.resubscribe().await;
        self.fetch().await
    }

    async fn resubscribe(self: &Arc<Self>) {
        let table = *self.table.lock();
        match self.backend.subscribe(table).await {
            Ok(feed) => {
                let subscription = feed.channel_name();
                let handle = tokio::spawn(listen(Arc::downgrade(self), feed));

                if self.unmounted.load(Ordering::SeqCst) {
                    handle.abort();
                    return;
                }
                if let Some(previous) = self.listener.lock().replace(handle) {
                    previous.abort();
                }
                self.state.send_if_modified(|s| s.subscription_error.take().is_some());

                tracing::debug!(table = %table, subscription = %subscription, "subscribed to changes");
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "failed to open change subscription");
                let message = e.to_string();
                self.state.send_if_modified(|s| {
                    if s.phase == ViewPhase::Unmounted {
                        return false;
                    }
                    s.subscription_error = Some(message);
                    true
                });
            }
        }
    }

    fn release_subscription(&self) {
        let released = self.listener.lock().take();
        if let Some(handle) = released {
            handle.abort();
            let table = *self.table.lock();
            tracing::debug!(table = %table, "change subscription released");
        }
    }

    fn unmount(&self) {
        self.unmounted.store(true, Ordering::SeqCst);
        self.release_subscription();
        self.state.send_modify(|s| {
            s.loading = false;
            s.phase = ViewPhase::Unmounted;
        });
    }

    async fn fetch(&self) -> ClientResult<()> {
        let table = *self.table.lock();
        let epoch = self.session_epoch.load(Ordering::SeqCst);
        let viewer = self.viewer.read().clone();

        let guard = InFlight::begin(self, epoch);
        let result = self.load(table, &viewer).await;
        guard.finish(&result);

        result.map(|_| ())
    }

    async fn load(&self, table: TableName, viewer: &ViewerContext) -> ClientResult<Vec<R>> {
        let rows = self
            .backend
            .select_all(table)
            .await
            .map_err(|e| Error::backend("fetch", e))?;

        let total = rows.len();
        let visible = filter_visible(viewer, rows);

        tracing::debug!(
            table = %table,
            level = %viewer.level(),
            rank = viewer.level().rank(),
            total,
            visible = visible.len(),
            "fetched rows"
        );

        visible
            .into_iter()
            .map(|row| R::from_value(row).map_err(Error::from))
            .collect()
    }

    fn modify_rows<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<R>),
    {
        self.state.send_if_modified(|s| {
            if s.phase == ViewPhase::Unmounted {
                return false;
            }
            f(&mut s.rows);
            true
        });
    }
}

impl<R: Record, B: Backend> Drop for ViewInner<R, B> {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

/// Tracks one in-flight fetch.
///
/// The counter only changes inside the state lock, so the `loading` flag
/// always matches the number of fetches still running. Dropping the guard
/// without finishing it (a cancelled fetch) still releases the slot.
struct InFlight<'a, R: Record, B: Backend> {
    inner: &'a ViewInner<R, B>,
    epoch: u64,
    finished: bool,
}

impl<'a, R: Record, B: Backend> InFlight<'a, R, B> {
    fn begin(inner: &'a ViewInner<R, B>, epoch: u64) -> Self {
        inner.state.send_if_modified(|s| {
            inner.in_flight.fetch_add(1, Ordering::SeqCst);
            if s.phase == ViewPhase::Unmounted {
                return false;
            }
            s.loading = true;
            s.error = None;
            s.phase = ViewPhase::Loading;
            true
        });
        Self {
            inner,
            epoch,
            finished: false,
        }
    }

    /// Store the result of a fetch.
    ///
    /// Rows are refiltered against the viewer at the time the fetch resolves,
    /// which may differ from the one it started under. A fetch that started
    /// before a sign-out leaves the signed-out view untouched.
    fn finish(mut self, result: &ClientResult<Vec<R>>) {
        self.finished = true;
        let inner = self.inner;
        let epoch = self.epoch;
        inner.state.send_if_modified(|s| {
            let remaining = inner.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            if s.phase == ViewPhase::Unmounted {
                return false;
            }

            let viewer = inner.viewer.read().clone();
            let session_changed = inner.session_epoch.load(Ordering::SeqCst) != epoch;
            if session_changed && !viewer.has_session() {
                s.loading = remaining > 0;
                return true;
            }

            let settled = match result {
                Ok(rows) => {
                    s.rows = rows
                        .iter()
                        .filter(|row| visible_to(&viewer, *row))
                        .cloned()
                        .collect();
                    s.error = None;
                    ViewPhase::Ready
                }
                Err(e) => {
                    s.error = Some(e.to_string());
                    ViewPhase::Errored
                }
            };
            s.loading = remaining > 0;
            s.phase = if s.loading { ViewPhase::Loading } else { settled };
            true
        });
    }
}

impl<R: Record, B: Backend> Drop for InFlight<'_, R, B> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let inner = self.inner;
        inner.state.send_if_modified(|s| {
            let remaining = inner.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            if s.phase == ViewPhase::Unmounted || remaining > 0 {
                return false;
            }
            s.loading = false;
            if s.phase == ViewPhase::Loading {
                s.phase = if s.error.is_some() {
                    ViewPhase::Errored
                } else {
                    ViewPhase::Ready
                };
            }
            true
        });
    }
}

fn visible_to<R: Record>(viewer: &ViewerContext, row: &R) -> bool {
    row.clearance_level()
        .is_some_and(|level| viewer.can_view(level))
}

/// Refetch on every change until the feed closes or the view is gone.
async fn listen<R: Record, B: Backend>(view: Weak<ViewInner<R, B>>, mut feed: ChangeFeed) {
    while let Some(event) = feed.recv().await {
        let Some(inner) = view.upgrade() else {
            break;
        };
        if inner.unmounted.load(Ordering::SeqCst) {
            break;
        }

        tracing::debug!(
            table = %event.table,
            change = ?event.change_type,
            "change received, refetching"
        );

        tokio::spawn(async move {
            if let Err(e) = inner.fetch().await {
                tracing::warn!(table = %event.table, error = %e, "refetch after change failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use dccu_proto::{ClearanceLevel, Module, ModulePatch, NewModule};
    use serde_json::json;

    fn session(level: ClearanceLevel) -> Option<Session> {
        Some(Session::new("agent", level))
    }

    async fn wait_for_subscribers(backend: &MemoryBackend, table: TableName, expected: usize) {
        for _ in 0..100 {
            if backend.subscriber_count(table) == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("expected {} subscribers on {}", expected, table);
    }

    fn draft(name: &str, level: ClearanceLevel) -> NewModule {
        NewModule {
            name: name.to_string(),
            description: format!("{} module", name),
            clearance_level: level,
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let view: TableView<Module, _> =
            TableView::new(Arc::new(MemoryBackend::new()), session(ClearanceLevel::Beta));
        let state = view.snapshot();
        assert_eq!(state.phase, ViewPhase::Idle);
        assert!(!state.loading);
        assert!(state.rows.is_empty());
        assert_eq!(view.table(), TableName::Modules);
        assert!(!view.can_modify());
    }

    #[tokio::test]
    async fn test_mount_without_session_does_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let view: TableView<Module, _> = TableView::new(backend.clone(), None);
        view.mount().await.unwrap();

        assert_eq!(backend.select_calls(), 0);
        assert_eq!(backend.subscribe_calls(), 0);
        assert_eq!(view.snapshot().phase, ViewPhase::Idle);
    }

    #[tokio::test]
    async fn test_fetch_without_session_is_delta() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(TableName::Modules, json!({"name": "d", "description": "", "clearance_level": "DELTA"}));
        backend.seed(TableName::Modules, json!({"name": "g", "description": "", "clearance_level": "GAMMA"}));

        let view: TableView<Row, _> = TableView::for_table(backend, TableName::Modules, None);
        view.fetch().await.unwrap();

        let rows = view.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("name"), Some("d"));
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_rows() {
        let backend = Arc::new(MemoryBackend::new());
        let alpha: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));
        alpha.insert(&draft("Oracle", ClearanceLevel::Delta)).await.unwrap();
        alpha.fetch().await.unwrap();

        backend.fail_next_select("connection reset");
        let err = alpha.fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "failed to fetch data: transport error: connection reset");

        let state = alpha.snapshot();
        assert_eq!(state.rows.len(), 1);
        assert!(!state.loading);
        assert_eq!(state.phase, ViewPhase::Errored);
        assert!(state.error.is_some());

        alpha.fetch().await.unwrap();
        assert!(alpha.error().is_none());
        assert_eq!(alpha.snapshot().phase, ViewPhase::Ready);
    }

    #[tokio::test]
    async fn test_update_and_remove_patch_rows() {
        let backend = Arc::new(MemoryBackend::new());
        let view: TableView<Module, _> = TableView::new(backend, session(ClearanceLevel::Alpha));
        let created = view.insert(&draft("Cave", ClearanceLevel::Gamma)).await.unwrap();

        let patch = ModulePatch {
            description: Some("Relocated".to_string()),
            ..Default::default()
        };
        let updated = view.update(&created.id, &patch).await.unwrap();
        assert_eq!(updated.description, "Relocated");
        assert_eq!(updated.name, "Cave");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(view.rows()[0].description, "Relocated");

        view.remove(&created.id).await.unwrap();
        assert!(view.rows().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped() {
        let backend = Arc::new(MemoryBackend::new());
        let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));

        backend.fail_next_mutation("disk full");
        let err = view
            .insert(&draft("Lab", ClearanceLevel::Beta))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend { op: "insert", .. }));
        assert!(view.rows().is_empty());

        let err = view.update("missing", &ModulePatch::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to update data: row not found");
    }

    #[tokio::test]
    async fn test_unmount_discards_results() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(TableName::Modules, json!({"name": "d", "description": "", "clearance_level": "DELTA"}));
        let view: TableView<Row, _> =
            TableView::for_table(backend.clone(), TableName::Modules, session(ClearanceLevel::Delta));

        view.mount().await.unwrap();
        assert!(view.is_subscribed());
        assert_eq!(view.rows().len(), 1);

        view.unmount();
        assert!(!view.is_subscribed());
        view.fetch().await.unwrap();

        let state = view.snapshot();
        assert_eq!(state.phase, ViewPhase::Unmounted);
        assert!(!state.loading);
        wait_for_subscribers(&backend, TableName::Modules, 0).await;
    }

    #[tokio::test]
    async fn test_set_table_refetches() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(TableName::Modules, json!({"name": "m", "clearance_level": "DELTA"}));
        backend.seed(TableName::Movies, json!({"title": "a", "clearance_level": "DELTA"}));
        backend.seed(TableName::Movies, json!({"title": "b", "clearance_level": "DELTA"}));

        let view: TableView<Row, _> =
            TableView::for_table(backend.clone(), TableName::Modules, session(ClearanceLevel::Gamma));
        view.mount().await.unwrap();
        assert_eq!(view.rows().len(), 1);

        view.set_table(TableName::Movies).await.unwrap();
        assert_eq!(view.table(), TableName::Movies);
        assert_eq!(view.rows().len(), 2);
        assert_eq!(backend.subscribe_calls(), 2);
        wait_for_subscribers(&backend, TableName::Modules, 0).await;
        assert_eq!(backend.subscriber_count(TableName::Movies), 1);
    }

    #[tokio::test]
    async fn test_subscription_failure_still_fetches() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_next_subscribe("socket refused");
        let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Beta));

        view.mount().await.unwrap();
        let state = view.snapshot();
        assert_eq!(state.phase, ViewPhase::Ready);
        assert!(state
            .subscription_error
            .as_deref()
            .is_some_and(|m| m.contains("socket refused")));
        assert!(!view.is_subscribed());
        assert_eq!(backend.select_calls(), 1);
    }
}
