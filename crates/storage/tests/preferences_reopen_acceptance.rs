use serde_json::json;
use shared::protocol::{PreferenceKey, PreferenceKind};
use storage::{PreferencesStore, Storage};

#[tokio::test]
async fn preferences_survive_reopening_the_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("grid.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let key = PreferenceKey::new("EXAMPLE_TABLE", PreferenceKind::Sorting);

    {
        let storage = Storage::new(&database_url).await.expect("open");
        storage
            .save_preference(&key, &json!([{"columnName": "name", "direction": "asc"}]))
            .await
            .expect("save");
        storage.pool().close().await;
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let loaded = reopened.load_preference(&key).await.expect("load");
    assert_eq!(
        loaded,
        Some(json!([{"columnName": "name", "direction": "asc"}]))
    );

    let listed = reopened
        .list_preferences("EXAMPLE_TABLE")
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert!(listed[0].updated_at <= chrono::Utc::now());
}
