//! Integration tests for clearance-filtered table views.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dccu_client::{Backend, Error, MemoryBackend, TableView, ViewPhase, ViewSnapshot};
use dccu_proto::{
    ClearanceLevel, Module, ModulePatch, NewModule, Record, Row, Session, TableName,
};

fn session(level: ClearanceLevel) -> Option<Session> {
    Some(Session::new(format!("agent-{}", level), level))
}

fn seed_module(backend: &MemoryBackend, name: &str, level: &str) -> String {
    let row = backend.seed(
        TableName::Modules,
        json!({ "name": name, "description": format!("{} file", name), "clearance_level": level }),
    );
    row["id"].as_str().unwrap().to_string()
}

fn names(rows: &[Module]) -> Vec<&str> {
    rows.iter().map(|m| m.name.as_str()).collect()
}

async fn wait_until<R, B, F>(view: &TableView<R, B>, pred: F)
where
    R: Record,
    B: Backend,
    F: Fn(&ViewSnapshot<R>) -> bool,
{
    let mut rx = view.subscribe_state();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let done = pred(&rx.borrow_and_update());
            if done || rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .expect("view never reached the expected state");
}

#[tokio::test]
async fn test_visible_set_matches_clearance_order() {
    let backend = Arc::new(MemoryBackend::new());
    for level in ClearanceLevel::ALL {
        seed_module(&backend, level.as_str(), level.as_str());
    }
    seed_module(&backend, "unknown", "OMEGA");
    seed_module(&backend, "lowercase", "delta");

    for viewer in ClearanceLevel::ALL {
        let view: TableView<Row, _> =
            TableView::for_table(backend.clone(), TableName::Modules, session(viewer));
        view.fetch().await.unwrap();

        let rows = view.rows();
        assert_eq!(rows.len(), viewer.rank() as usize, "viewer {}", viewer);
        for row in &rows {
            let level = row.clearance_level().unwrap();
            assert!(level.rank() <= viewer.rank());
        }
    }
}

#[tokio::test]
async fn test_delta_never_sees_higher_rows() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "gamma", "GAMMA");
    seed_module(&backend, "beta", "BETA");
    seed_module(&backend, "alpha", "ALPHA");

    let view: TableView<Module, _> = TableView::new(backend, session(ClearanceLevel::Delta));
    view.fetch().await.unwrap();
    assert!(view.rows().is_empty());
    assert_eq!(view.snapshot().phase, ViewPhase::Ready);
}

#[tokio::test]
async fn test_writes_rejected_below_alpha_before_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let id = seed_module(&backend, "cave", "DELTA");

    let viewers = [
        None,
        session(ClearanceLevel::Delta),
        session(ClearanceLevel::Gamma),
        session(ClearanceLevel::Beta),
    ];

    for viewer in viewers {
        let view: TableView<Module, _> = TableView::new(backend.clone(), viewer);
        assert!(!view.can_modify());

        let draft = NewModule {
            name: "intruder".to_string(),
            description: String::new(),
            clearance_level: ClearanceLevel::Delta,
        };
        let err = view.insert(&draft).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err
            .to_string()
            .contains("insufficient clearance for data modification"));

        let err = view.update(&id, &ModulePatch::default()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = view.remove(&id).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    assert_eq!(backend.mutation_calls(), 0);
    assert_eq!(backend.rows(TableName::Modules).len(), 1);
}

#[tokio::test]
async fn test_fetch_is_idempotent() {
    let backend = Arc::new(MemoryBackend::new());
    for (name, level) in [("a", "DELTA"), ("b", "BETA"), ("c", "GAMMA")] {
        seed_module(&backend, name, level);
    }

    let view: TableView<Module, _> = TableView::new(backend, session(ClearanceLevel::Beta));
    view.fetch().await.unwrap();
    let first = view.rows();
    view.fetch().await.unwrap();

    assert_eq!(first, view.rows());
    assert_eq!(names(&first), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_insert_then_fetch_round_trip() {
    let backend = Arc::new(MemoryBackend::new());
    let view: TableView<Module, _> = TableView::new(backend, session(ClearanceLevel::Alpha));

    let draft = NewModule {
        name: "Oracle".to_string(),
        description: "Information broker".to_string(),
        clearance_level: ClearanceLevel::Gamma,
    };
    let inserted = view.insert(&draft).await.unwrap();
    assert!(!inserted.id.is_empty());
    assert_eq!(view.rows()[0].id, inserted.id);

    view.fetch().await.unwrap();
    let found = view
        .rows()
        .into_iter()
        .find(|m| m.id == inserted.id)
        .unwrap();
    assert_eq!(found.name, draft.name);
    assert_eq!(found.description, draft.description);
    assert_eq!(found.clearance_level, draft.clearance_level);
}

#[tokio::test]
async fn test_beta_sees_lower_rows_newest_first() {
    let backend = Arc::new(MemoryBackend::new());
    for level in ["DELTA", "GAMMA", "BETA", "ALPHA"] {
        seed_module(&backend, level, level);
    }

    let view: TableView<Module, _> = TableView::new(backend, session(ClearanceLevel::Beta));
    view.fetch().await.unwrap();

    assert_eq!(names(&view.rows()), vec!["BETA", "GAMMA", "DELTA"]);
}

#[tokio::test]
async fn test_push_notification_triggers_refetch() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "existing", "DELTA");

    let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Gamma));
    view.mount().await.unwrap();
    assert_eq!(view.rows().len(), 1);

    backend
        .insert(
            TableName::Modules,
            json!({ "name": "pushed", "description": "", "clearance_level": "GAMMA" }),
        )
        .await
        .unwrap();

    wait_until(&view, |s| s.rows.len() == 2 && !s.loading).await;
    assert_eq!(view.rows()[0].name, "pushed");
}

#[tokio::test]
async fn test_push_during_fetch_last_response_wins() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "first", "DELTA");

    let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Delta));
    view.mount().await.unwrap();
    assert_eq!(backend.select_calls(), 1);

    // The manual fetch reads the old table but resolves after the push refetch.
    backend.push_select_delay(Duration::from_millis(200));
    let manual = tokio::spawn({
        let view = view.clone();
        async move { view.fetch().await }
    });

    while backend.select_calls() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(view.is_loading());

    backend
        .insert(
            TableName::Modules,
            json!({ "name": "late", "description": "", "clearance_level": "DELTA" }),
        )
        .await
        .unwrap();

    wait_until(&view, |s| s.rows.len() == 2).await;
    assert!(view.is_loading());

    manual.await.unwrap().unwrap();

    let state = view.snapshot();
    assert_eq!(backend.select_calls(), 3);
    assert!(!state.loading);
    assert_eq!(state.phase, ViewPhase::Ready);
    assert_eq!(names(&state.rows), vec!["first"]);
}

#[tokio::test]
async fn test_alpha_update_leaves_gamma_cache_stale() {
    let backend = Arc::new(MemoryBackend::new());
    let id = seed_module(&backend, "watchtower", "GAMMA");

    let alpha: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));
    let gamma: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Gamma));
    alpha.fetch().await.unwrap();
    gamma.fetch().await.unwrap();
    assert_eq!(gamma.rows().len(), 1);

    let patch = ModulePatch {
        clearance_level: Some(ClearanceLevel::Alpha),
        ..Default::default()
    };
    alpha.update(&id, &patch).await.unwrap();

    assert_eq!(alpha.rows()[0].clearance_level, ClearanceLevel::Alpha);
    assert_eq!(gamma.rows()[0].clearance_level, ClearanceLevel::Gamma);

    gamma.fetch().await.unwrap();
    assert!(gamma.rows().is_empty());
}

#[tokio::test]
async fn test_mounted_gamma_converges_after_push() {
    let backend = Arc::new(MemoryBackend::new());
    let id = seed_module(&backend, "watchtower", "GAMMA");

    let alpha: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));
    let gamma: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Gamma));
    gamma.mount().await.unwrap();
    assert_eq!(gamma.rows().len(), 1);

    let patch = ModulePatch {
        clearance_level: Some(ClearanceLevel::Alpha),
        ..Default::default()
    };
    alpha.update(&id, &patch).await.unwrap();

    wait_until(&gamma, |s| s.rows.is_empty() && !s.loading).await;
}

#[tokio::test]
async fn test_session_change_resubscribes_and_refetches() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "low", "DELTA");
    seed_module(&backend, "high", "BETA");

    let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Delta));
    view.mount().await.unwrap();
    assert_eq!(names(&view.rows()), vec!["low"]);

    view.set_session(session(ClearanceLevel::Beta)).await.unwrap();
    assert_eq!(names(&view.rows()), vec!["high", "low"]);
    assert_eq!(backend.subscribe_calls(), 2);
    assert!(view.is_subscribed());

    view.set_session(None).await.unwrap();
    let state = view.snapshot();
    assert!(state.rows.is_empty());
    assert_eq!(state.phase, ViewPhase::Idle);
    assert!(!view.is_subscribed());
}

#[tokio::test]
async fn test_slow_fetch_refiltered_after_downgrade() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "d", "DELTA");
    seed_module(&backend, "a", "ALPHA");

    let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));

    // Started under ALPHA, resolves after the switch to DELTA.
    backend.push_select_delay(Duration::from_millis(200));
    let slow = tokio::spawn({
        let view = view.clone();
        async move { view.fetch().await }
    });
    while backend.select_calls() < 1 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    view.set_session(session(ClearanceLevel::Delta)).await.unwrap();
    slow.await.unwrap().unwrap();

    let state = view.snapshot();
    assert_eq!(names(&state.rows), vec!["d"]);
    assert!(state
        .rows
        .iter()
        .all(|m| m.clearance_level == ClearanceLevel::Delta));
    assert!(!state.loading);
}

#[tokio::test]
async fn test_slow_fetch_discarded_after_sign_out() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "a", "ALPHA");

    let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));

    backend.push_select_delay(Duration::from_millis(200));
    let slow = tokio::spawn({
        let view = view.clone();
        async move { view.fetch().await }
    });
    while backend.select_calls() < 1 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    view.set_session(None).await.unwrap();
    slow.await.unwrap().unwrap();

    let state = view.snapshot();
    assert!(state.rows.is_empty());
    assert_eq!(state.phase, ViewPhase::Idle);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_downgrade_with_failed_refetch_hides_higher_rows() {
    let backend = Arc::new(MemoryBackend::new());
    seed_module(&backend, "d", "DELTA");
    seed_module(&backend, "a", "ALPHA");

    let view: TableView<Module, _> = TableView::new(backend.clone(), session(ClearanceLevel::Alpha));
    view.mount().await.unwrap();
    assert_eq!(names(&view.rows()), vec!["a", "d"]);

    backend.fail_next_select("backend unavailable");
    let result = view.set_session(session(ClearanceLevel::Delta)).await;
    assert!(result.is_err());

    let state = view.snapshot();
    assert_eq!(state.phase, ViewPhase::Errored);
    assert_eq!(names(&state.rows), vec!["d"]);
}
