//! End-to-end engine scenarios against the in-memory document store.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use weekplan_core::completion::toggle_completion;
use weekplan_core::document::Collection;
use weekplan_core::model::{BlockId, Role, TimerRecord, TimerStatus};
use weekplan_sync::{spawn_timer_ticker, ConnectionPhase, DocumentPatch, SyncEngine};
use weekplan_remote::{DocumentFields, DocumentPath, MemoryDocumentStore};
use weekplan_storage::{MemoryStore, SnapshotCache};

const FAM: &str = "fam-1";

fn household_path() -> DocumentPath {
    DocumentPath::new("households", FAM).unwrap()
}

fn new_engine(store: Arc<MemoryDocumentStore>) -> Arc<SyncEngine> {
    let cache = SnapshotCache::new(Arc::new(MemoryStore::new()));
    SyncEngine::new(store, cache, FAM).unwrap()
}

fn fields(raw: serde_json::Value) -> DocumentFields {
    raw.as_object().cloned().expect("object literal")
}

async fn settle() {
    // Comfortably beyond the engine's write debounce window.
    tokio::time::sleep(Duration::from_millis(400)).await;
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn connect_creates_the_document_once_with_empty_collections() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    assert_eq!(engine.status().phase, ConnectionPhase::Live);
    assert!(engine.ready());

    let raw = store.document(&household_path()).expect("document created");
    for collection in Collection::ALL {
        assert!(raw.contains_key(collection.field_name()), "{collection:?}");
    }
    assert_eq!(raw["users"], serde_json::json!([]));
    assert!(raw.contains_key("createdAt"));

    // A second device connecting finds the document and does not recreate it.
    let second = new_engine(store.clone());
    second.connect().await;
    assert_eq!(second.status().phase, ConnectionPhase::Live);
    assert_eq!(store.document(&household_path()).unwrap()["users"], serde_json::json!([]));

    engine.shutdown();
    second.shutdown();
}

#[tokio::test]
async fn save_flushes_a_sanitized_merge_write() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    let completions = toggle_completion(&[], "t1", "u_lina", date("2026-08-07"), BlockId::Post);
    engine.save(DocumentPatch::new().with_completions(completions));
    settle().await;

    let raw = store.document(&household_path()).unwrap();
    let written = raw["completions"].as_array().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0]["taskId"], "t1");
    // The merge-write named only the changed collection, so the bootstrap
    // values of the others are untouched.
    assert_eq!(raw["users"], serde_json::json!([]));

    engine.shutdown();
}

#[tokio::test]
async fn same_turn_saves_coalesce_into_one_write_without_losing_either() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    let d = date("2026-08-07");
    let completions = toggle_completion(&[], "t1", "u_lina", d, BlockId::Post);
    engine.save(DocumentPatch::new().with_completions(completions));
    engine.save(DocumentPatch::new().with_timers(vec![TimerRecord {
        id: "t1__u_lina__2026-08-07__post".to_string(),
        task_id: "t1".to_string(),
        user_id: "u_lina".to_string(),
        date: d,
        block: BlockId::Post,
        remaining_sec: 60,
        status: TimerStatus::Paused,
    }]));
    settle().await;

    let raw = store.document(&household_path()).unwrap();
    assert_eq!(raw["completions"].as_array().unwrap().len(), 1);
    assert_eq!(raw["timers"].as_array().unwrap().len(), 1);

    engine.shutdown();
}

#[tokio::test]
async fn echo_of_own_write_converges_without_special_casing() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    let completions = toggle_completion(&[], "t1", "u_lina", date("2026-08-07"), BlockId::Post);
    engine.save(DocumentPatch::new().with_completions(completions.clone()));
    settle().await;

    // The echo arrived through the subscription; local state equals it.
    let snapshot = engine.get_snapshot();
    assert_eq!(snapshot.completions, completions);

    engine.shutdown();
}

#[tokio::test]
async fn two_devices_converge_on_each_others_collections() {
    let store = Arc::new(MemoryDocumentStore::new());
    let device_a = new_engine(store.clone());
    let device_b = new_engine(store.clone());
    device_a.connect().await;
    device_b.connect().await;

    let completions = toggle_completion(&[], "t1", "u_lina", date("2026-08-07"), BlockId::Post);
    device_a.save(DocumentPatch::new().with_completions(completions));

    let suppressions = [weekplan_core::keys::OccurrenceKey::new(
        "t2",
        date("2026-08-07"),
        BlockId::Pre,
    )]
    .into_iter()
    .collect();
    device_b.save(DocumentPatch::new().with_suppressions(suppressions));

    settle().await;
    settle().await;

    // Different collections from different devices never conflict.
    for engine in [&device_a, &device_b] {
        let snapshot = engine.get_snapshot();
        assert_eq!(snapshot.completions.len(), 1, "completions converged");
        assert_eq!(snapshot.suppressions.len(), 1, "suppressions converged");
    }

    device_a.shutdown();
    device_b.shutdown();
}

#[tokio::test]
async fn remote_snapshot_naming_one_collection_preserves_the_rest() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    engine.save(DocumentPatch::new().with_tasks(vec![]).with_completions(
        toggle_completion(&[], "t1", "u_lina", date("2026-08-07"), BlockId::Post),
    ));
    settle().await;
    let before = engine.get_snapshot();
    assert_eq!(before.completions.len(), 1);

    // A foreign write touching only `users` arrives.
    store.push_raw_snapshot(
        &household_path(),
        fields(serde_json::json!({
            "users": [{ "id": "u_new", "name": "New", "role": "child", "avatar": "" }]
        })),
    );
    settle().await;

    let after = engine.get_snapshot();
    assert_eq!(after.users.len(), 1);
    assert_eq!(after.completions, before.completions);

    engine.shutdown();
}

#[tokio::test]
async fn malformed_remote_field_is_ignored_field_by_field() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    store.push_raw_snapshot(
        &household_path(),
        fields(serde_json::json!({
            "tasks": "not-an-array",
            "users": [{ "id": "u_new", "name": "New", "role": "child", "avatar": "" }]
        })),
    );
    settle().await;

    let snapshot = engine.get_snapshot();
    assert!(snapshot.tasks.is_empty());
    assert_eq!(snapshot.users.len(), 1);

    engine.shutdown();
}

#[tokio::test]
async fn auth_failure_degrades_to_cache_only_mode() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.set_deny_auth(true);
    let engine = new_engine(store.clone());
    engine.connect().await;

    let status = engine.status();
    assert_eq!(status.phase, ConnectionPhase::Degraded);
    assert!(status.ready);
    assert!(status.last_error.is_some());

    // Local mutations still apply and survive in the optimistic snapshot.
    let completions = toggle_completion(&[], "t1", "u_lina", date("2026-08-07"), BlockId::Post);
    engine.save(DocumentPatch::new().with_completions(completions));
    assert_eq!(engine.get_snapshot().completions.len(), 1);
    // Nothing reached the remote store.
    assert!(store.document(&household_path()).is_none());

    engine.shutdown();
}

#[tokio::test]
async fn subscription_loss_degrades_without_dropping_state() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    engine.save(DocumentPatch::new().with_completions(toggle_completion(
        &[],
        "t1",
        "u_lina",
        date("2026-08-07"),
        BlockId::Post,
    )));
    settle().await;

    store.break_subscriptions(&household_path());
    settle().await;

    let status = engine.status();
    assert_eq!(status.phase, ConnectionPhase::Degraded);
    assert!(status.ready);
    assert_eq!(engine.get_snapshot().completions.len(), 1);

    engine.shutdown();
}

#[tokio::test]
async fn reconnect_after_degradation_goes_live_again() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.set_fail_subscribe(true);
    let engine = new_engine(store.clone());
    engine.connect().await;
    assert_eq!(engine.status().phase, ConnectionPhase::Degraded);

    store.set_fail_subscribe(false);
    engine.connect().await;
    assert_eq!(engine.status().phase, ConnectionPhase::Live);
    assert_eq!(engine.status().last_error, None);

    engine.shutdown();
}

#[tokio::test]
async fn shutdown_stops_snapshot_application_immediately() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;
    engine.shutdown();
    assert_eq!(engine.status().phase, ConnectionPhase::Disconnected);

    store.push_raw_snapshot(
        &household_path(),
        fields(serde_json::json!({
            "users": [{ "id": "u_new", "name": "New", "role": "child", "avatar": "" }]
        })),
    );
    settle().await;

    // The torn-down engine never saw the push.
    assert!(engine.get_snapshot().users.is_empty());
}

#[tokio::test]
async fn offline_saves_flush_once_connected() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());

    // Save before any connection exists.
    let completions = toggle_completion(&[], "t1", "u_lina", date("2026-08-07"), BlockId::Post);
    engine.save(DocumentPatch::new().with_completions(completions));
    assert!(store.document(&household_path()).is_none());

    engine.connect().await;
    settle().await;

    let raw = store.document(&household_path()).unwrap();
    assert_eq!(raw["completions"].as_array().unwrap().len(), 1);

    engine.shutdown();
}

#[tokio::test]
async fn ticker_counts_down_and_autocompletes_at_zero() {
    let store = Arc::new(MemoryDocumentStore::new());
    let engine = new_engine(store.clone());
    engine.connect().await;

    let d = date("2026-08-07");
    engine.save(DocumentPatch::new().with_timers(vec![TimerRecord {
        id: "t1__u_lina__2026-08-07__post".to_string(),
        task_id: "t1".to_string(),
        user_id: "u_lina".to_string(),
        date: d,
        block: BlockId::Post,
        remaining_sec: 2,
        status: TimerStatus::Running,
    }]));

    let guard = spawn_timer_ticker(Arc::clone(&engine));
    tokio::time::sleep(Duration::from_millis(2_600)).await;
    drop(guard);

    let snapshot = engine.get_snapshot();
    assert_eq!(snapshot.timers[0].remaining_sec, 0);
    assert_eq!(snapshot.timers[0].status, TimerStatus::Paused);
    assert_eq!(snapshot.completions.len(), 1);
    assert_eq!(snapshot.completions[0].task_id, "t1");

    // Guard dropped: no further saves happen.
    let timers_after = engine.get_snapshot().timers.clone();
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(engine.get_snapshot().timers, timers_after);

    engine.shutdown();
}

#[tokio::test]
async fn cold_start_seed_satisfies_first_render() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.set_deny_auth(true);
    let engine = new_engine(store);

    let snapshot = engine.get_snapshot();
    assert!(snapshot.users.len() >= 2);
    assert!(snapshot.users.iter().any(|u| u.role == Role::Parent));
    assert!(snapshot.users.iter().any(|u| u.role == Role::Child));
    assert_eq!(snapshot.completions.len(), 0);
    assert!(snapshot.tasks.is_empty());
    assert!(snapshot.timers.is_empty());
    assert!(snapshot.suppressions.is_empty());
}
