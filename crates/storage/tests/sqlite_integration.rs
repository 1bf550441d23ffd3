use linguify_core::model::{
    EntityId, EntityRef, Percentage, PendingSyncRequest, ProgressPayload, ProgressSnapshot,
    UpdateKind,
};
use linguify_core::time::fixed_now;
use storage::keys;
use storage::repository::KeyValueStore;
use storage::sqlite::SqliteStore;
use storage::LocalMirror;

async fn connect(name: &str) -> SqliteStore {
    let store = SqliteStore::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");
    store
}

#[tokio::test]
async fn sqlite_put_get_overwrite_and_remove() {
    let store = connect("memdb_kv_basic").await;

    assert!(store.get("a").await.unwrap().is_none());
    store.put("a", "1".into()).await.unwrap();
    store.put("a", "2".into()).await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));

    store.remove("a").await.unwrap();
    store.remove("a").await.unwrap();
    assert!(store.get("a").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_scan_matches_prefix_in_insertion_order() {
    let store = connect("memdb_kv_scan").await;

    store.put("p:b", "1".into()).await.unwrap();
    store.put("q:a", "x".into()).await.unwrap();
    store.put("p:a", "2".into()).await.unwrap();
    store.put("p:b", "3".into()).await.unwrap();
    store.put("p%", "literal".into()).await.unwrap();

    let scanned = store.scan_prefix("p:").await.unwrap();
    assert_eq!(
        scanned,
        vec![
            ("p:b".to_string(), "3".to_string()),
            ("p:a".to_string(), "2".to_string()),
        ]
    );
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let store = connect("memdb_kv_migrate").await;
    store.migrate().await.expect("second migrate");
    store.put("k", "v".into()).await.unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn sqlite_backs_typed_mirror() {
    let store = connect("memdb_kv_mirror").await;
    let mirror = LocalMirror::new(std::sync::Arc::new(store.clone()));

    let snapshot = ProgressSnapshot::new(
        EntityRef::content_lesson(5),
        Some(EntityId::new(2)),
        Percentage::new(60).unwrap(),
        false,
        fixed_now(),
    );
    assert!(mirror.put_snapshot(&snapshot).await);
    assert_eq!(mirror.snapshot(snapshot.entity).await, Some(snapshot));

    let payload = ProgressPayload {
        content_lesson_id: Some(EntityId::new(5)),
        lesson_id: EntityId::new(2),
        completion_percentage: Percentage::new(60).unwrap(),
        time_spent: 12,
        xp_earned: Some(5),
        mark_completed: false,
        language_code: "es".into(),
    };
    let queued = PendingSyncRequest::new(UpdateKind::Content, payload, fixed_now());
    assert!(mirror.put_pending(UpdateKind::Content, &[queued.clone()]).await);
    assert_eq!(mirror.pending(UpdateKind::Content).await, vec![queued]);

    store
        .put(&keys::pending_queue_key(UpdateKind::Lesson), "{oops".into())
        .await
        .unwrap();
    assert!(mirror.pending(UpdateKind::Lesson).await.is_empty());
}
