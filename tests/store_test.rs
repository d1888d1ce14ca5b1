//! Integration tests for [`FileStore`] — on-disk snapshot roundtrip and the
//! metrics log persisting through it.

use std::sync::Arc;
use std::time::Duration;

use muninn::metrics_log::STORAGE_KEY;
use muninn::{FileStore, LoadOutcome, MetricsConfig, MetricsLog, MetricsStore, OperationMetric};

#[tokio::test]
async fn save_then_load_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    store.save("k", r#"{"a":1}"#).await.unwrap();
    assert_eq!(store.load("k").await.unwrap().as_deref(), Some(r#"{"a":1}"#));
    assert!(store.path_for("k").exists());

    // Only the data file remains
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn missing_key_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    assert!(store.load("absent").await.unwrap().is_none());
}

#[tokio::test]
async fn save_creates_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("a").join("b"));

    store.save(STORAGE_KEY, "[]").await.unwrap();
    assert!(dir.path().join("a/b/operation_metrics.json").exists());
}

#[tokio::test]
async fn save_overwrites_previous_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    store.save("k", "first").await.unwrap();
    store.save("k", "second").await.unwrap();
    assert_eq!(store.load("k").await.unwrap().as_deref(), Some("second"));
}

#[tokio::test]
async fn concurrent_saves_to_one_key_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let payload = "x".repeat(1 << 20);

    let saves: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let payload = payload.clone();
            tokio::spawn(async move { store.save("k", &payload).await })
        })
        .collect();
    for save in saves {
        save.await.unwrap().unwrap();
    }

    assert_eq!(store.load("k").await.unwrap().unwrap().len(), payload.len());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .filter(|name| name.to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "tmp files left behind: {leftovers:?}");
}

#[tokio::test]
async fn metrics_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    let log = MetricsLog::open(MetricsConfig::default(), store.clone()).await;
    assert_eq!(log.load_outcome(), &LoadOutcome::Empty);
    log.record_operation("create", None, None);
    log.record_operation("delete", None, None);
    log.flush().await.unwrap();

    let on_disk: Vec<OperationMetric> =
        serde_json::from_str(&std::fs::read_to_string(store.path_for(STORAGE_KEY)).unwrap())
            .unwrap();
    assert_eq!(on_disk.len(), 2);

    let reopened = MetricsLog::open(MetricsConfig::default(), store).await;
    assert_eq!(reopened.load_outcome(), &LoadOutcome::Loaded(2));
    let kinds: Vec<_> = reopened.metrics().into_iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec!["create", "delete"]);
}

#[tokio::test]
async fn background_save_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let config = MetricsConfig::new().save_delay(Duration::from_millis(20));

    let log = MetricsLog::open(config, store.clone()).await;
    log.record_operation("list", None, None);
    assert!(log.save_pending());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!log.save_pending());
    assert!(store.path_for(STORAGE_KEY).exists());
}

#[tokio::test]
async fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    std::fs::write(store.path_for(STORAGE_KEY), "not json at all").unwrap();

    let log = MetricsLog::open(MetricsConfig::default(), store).await;
    assert!(matches!(log.load_outcome(), LoadOutcome::Corrupt(_)));
    assert!(log.is_empty());
}

#[tokio::test]
async fn unreadable_path_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    // A directory where the snapshot file should be
    std::fs::create_dir(store.path_for(STORAGE_KEY)).unwrap();

    let log = MetricsLog::open(MetricsConfig::default(), store).await;
    assert!(matches!(log.load_outcome(), LoadOutcome::Unreadable(_)));
    assert!(log.is_empty());
}
