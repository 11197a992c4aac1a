//! Integration tests for saving and resuming routing sessions.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use arbiter_adapters::{ScriptedAdapter, SessionRole};
use arbiter_models::{PersistedSession, RoutingIntent, SessionId, TurnEvent};
use arbiter_persistence::SessionStore;
use arbiter_router::{NoopCallbacks, RouterConfig, RoutingEngine};

fn engine(adapter: &Arc<ScriptedAdapter>) -> RoutingEngine {
    RoutingEngine::new(adapter.clone(), Arc::new(NoopCallbacks), RouterConfig::default())
}

fn summon() -> Vec<TurnEvent> {
    vec![TurnEvent::routed(&RoutingIntent::SummonOrchestrator {
        briefing: Some("Write the docs.".into()),
    })]
}

#[tokio::test]
async fn test_shutdown_saves_resume_record() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::in_dir(dir.path());
    let adapter = Arc::new(ScriptedAdapter::new());
    adapter.push_turn(SessionRole::Arbiter, summon()).await;

    let mut engine = engine(&adapter).with_store(store.clone());
    engine.start().await.unwrap();
    engine.handle_human_message("docs please").await.unwrap();
    engine.settle().await.unwrap();

    let record = engine.shutdown().await.unwrap();

    assert_eq!(record.orchestrator_ordinal, 1);
    assert_eq!(record.arbiter_session_id.as_ref(), engine.state().arbiter_session_id());
    assert!(record.arbiter_session_id.is_some());
    assert!(record.last_orchestrator_session_id.is_some());

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.arbiter_session_id, record.arbiter_session_id);
    assert_eq!(loaded.last_orchestrator_session_id, record.last_orchestrator_session_id);
    assert_eq!(loaded.orchestrator_ordinal, 1);

    // Sessions stay open for reattachment.
    assert!(adapter.closed().await.is_empty());
}

#[tokio::test]
async fn test_resume_continues_ordinals_and_reattaches() {
    let adapter = Arc::new(ScriptedAdapter::new());
    adapter.push_turn(SessionRole::Arbiter, summon()).await;
    let previous = SessionId::from_string("sess-previous");
    let record = PersistedSession::new(Some(previous.clone()), None, 3);

    let mut engine = engine(&adapter);
    engine.resume(&record);
    engine.start().await.unwrap();

    assert_eq!(adapter.started().await[0].resume, Some(previous.clone()));
    assert_eq!(engine.state().arbiter_session_id(), Some(&previous));

    engine.handle_human_message("next task").await.unwrap();
    engine.settle().await.unwrap();

    let ordinal = engine.state().orchestrator().map(|r| r.ordinal.get());
    assert_eq!(ordinal, Some(4));
    assert_eq!(engine.state().snapshot().orchestrator_ordinal, 4);
}

#[tokio::test]
async fn test_run_saves_on_exit() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::in_dir(dir.path());
    let adapter = Arc::new(ScriptedAdapter::new());

    let engine = engine(&adapter).with_store(store.clone());
    let (human_tx, human_rx) = mpsc::channel(4);
    human_tx.send("hello".to_string()).await.unwrap();
    drop(human_tx);

    let record = engine.run(human_rx).await.unwrap();

    assert_eq!(adapter.sent_to(SessionRole::Arbiter).await, vec!["hello"]);
    assert_eq!(record.orchestrator_ordinal, 0);
    assert!(record.arbiter_session_id.is_some());
    assert_eq!(
        store.load().unwrap().map(|r| r.arbiter_session_id),
        Some(record.arbiter_session_id)
    );
}
