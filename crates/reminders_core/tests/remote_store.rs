mod support;

use reminders_core::{
    ChangeKind, RemoteConfig, RemoteStore, ReminderPatch, StoreError, StoreSource,
};
use std::time::Duration;
use support::{pay_rent, remote_config, spawn_fake_table};

#[tokio::test]
async fn create_list_update_delete_roundtrip() {
    let (table, base_url) = spawn_fake_table().await;
    let store = RemoteStore::new(&remote_config(&base_url));

    let record = pay_rent().validate().unwrap();
    let created = store.create(&record).await.unwrap();
    assert_eq!(created.id, "1");
    assert_eq!(created.title, "Pay rent");
    assert_eq!(created.note.as_deref(), Some("monthly"));
    assert!(!created.completed);
    assert_eq!(created.owner.as_deref(), Some("user-1"));
    assert!(created.created_at.is_some());

    let updated = store
        .update(&created.id, &ReminderPatch::completed(true))
        .await
        .unwrap();
    assert!(updated.completed);
    assert_eq!(updated.title, "Pay rent");
    assert_eq!(updated.due_at, created.due_at);

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].completed);

    store.delete(&created.id).await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
    assert!(table.rows().is_empty());
}

#[tokio::test]
async fn list_is_sorted_by_due_at_ascending() {
    let (table, base_url) = spawn_fake_table().await;
    table.seed("later", "2024-03-01T09:00:00+00:00");
    table.seed("sooner", "2024-01-01T09:00:00+00:00");
    table.seed("middle", "2024-02-01T09:00:00Z");

    let store = RemoteStore::new(&remote_config(&base_url));
    let titles: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|reminder| reminder.title)
        .collect();
    assert_eq!(titles, vec!["sooner", "middle", "later"]);
}

#[tokio::test]
async fn missing_rows_report_not_found() {
    let (_table, base_url) = spawn_fake_table().await;
    let store = RemoteStore::new(&remote_config(&base_url));

    let err = store
        .update("404", &ReminderPatch::completed(true))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "404"));

    let err = store.delete("404").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn server_errors_are_transient_and_auth_errors_are_rejected() {
    let (table, base_url) = spawn_fake_table().await;

    table.set_failing(true);
    let store = RemoteStore::new(&remote_config(&base_url));
    let err = store.list().await.unwrap_err();
    assert!(matches!(err, StoreError::Transient(_)));
    assert!(err.is_retryable());
    table.set_failing(false);

    let wrong_key = RemoteConfig {
        api_key: Some("wrong".to_string()),
        ..remote_config(&base_url)
    };
    let err = RemoteStore::new(&wrong_key).list().await.unwrap_err();
    match err {
        StoreError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("Invalid API key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unconfigured_client_never_reaches_the_server() {
    let (table, base_url) = spawn_fake_table().await;
    let config = RemoteConfig {
        api_key: None,
        ..remote_config(&base_url)
    };
    let store = RemoteStore::new(&config);

    let err = store.create(&pay_rent().validate().unwrap()).await.unwrap_err();
    assert!(matches!(err, StoreError::Configuration(_)));
    assert_eq!(table.request_count(), 0);
}

#[tokio::test]
async fn writes_emit_remote_change_events() {
    let (_table, base_url) = spawn_fake_table().await;
    let store = RemoteStore::new(&remote_config(&base_url));
    let mut changes = store.subscribe();

    let created = store.create(&pay_rent().validate().unwrap()).await.unwrap();
    let event = changes.next().await.unwrap();
    assert_eq!(event.source, StoreSource::Remote);
    assert_eq!(event.kind, ChangeKind::Inserted);
    assert_eq!(event.id.as_deref(), Some(created.id.as_str()));

    store.delete(&created.id).await.unwrap();
    assert_eq!(changes.next().await.unwrap().kind, ChangeKind::Deleted);
}

#[tokio::test]
async fn poller_reports_changes_made_by_other_clients() {
    let (table, base_url) = spawn_fake_table().await;
    let store = RemoteStore::new(&remote_config(&base_url));
    let mut changes = store.subscribe();
    let poller = store.spawn_poller(Duration::from_millis(50));

    // Let the first poll seed the snapshot.
    tokio::time::sleep(Duration::from_millis(120)).await;
    table.seed("added elsewhere", "2024-01-05T10:00:00Z");

    let event = tokio::time::timeout(Duration::from_secs(5), changes.next())
        .await
        .expect("poller should notice the new row")
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Refreshed);
    assert_eq!(event.source, StoreSource::Remote);
    poller.stop();
}
