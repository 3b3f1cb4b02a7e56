use super::*;
use serde_json::json;

fn sorting_key(grid_id: &str) -> PreferenceKey {
    PreferenceKey::new(grid_id, PreferenceKind::Sorting)
}

fn hidden_key(grid_id: &str) -> PreferenceKey {
    PreferenceKey::new(grid_id, PreferenceKind::HiddenColumnsNames)
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn missing_preference_loads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let loaded = storage
        .load_preference(&sorting_key("users"))
        .await
        .expect("load");
    assert!(loaded.is_none());
}

#[tokio::test]
async fn saved_preference_overwrites_previous_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let key = sorting_key("users");

    storage
        .save_preference(&key, &json!([{"columnName": "name", "direction": "asc"}]))
        .await
        .expect("first save");
    storage
        .save_preference(&key, &json!([{"columnName": "email", "direction": "desc"}]))
        .await
        .expect("second save");

    let loaded = storage.load_preference(&key).await.expect("load");
    assert_eq!(
        loaded,
        Some(json!([{"columnName": "email", "direction": "desc"}]))
    );
}

#[tokio::test]
async fn preferences_are_scoped_by_grid_and_kind() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_preference(&hidden_key("users"), &json!(["email"]))
        .await
        .expect("save users");
    storage
        .save_preference(&hidden_key("orders"), &json!(["total"]))
        .await
        .expect("save orders");

    assert_eq!(
        storage
            .load_preference(&hidden_key("users"))
            .await
            .expect("load"),
        Some(json!(["email"]))
    );
    assert!(storage
        .load_preference(&sorting_key("users"))
        .await
        .expect("load")
        .is_none());

    let listed = storage.list_preferences("users").await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key.kind, PreferenceKind::HiddenColumnsNames);
}

#[tokio::test]
async fn clear_preferences_only_touches_one_grid() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_preference(&sorting_key("users"), &json!([]))
        .await
        .expect("save");
    storage
        .save_preference(&hidden_key("users"), &json!(["email"]))
        .await
        .expect("save");
    storage
        .save_preference(&hidden_key("orders"), &json!(["total"]))
        .await
        .expect("save");

    let removed = storage.clear_preferences("users").await.expect("clear");
    assert_eq!(removed, 2);
    assert!(storage
        .list_preferences("users")
        .await
        .expect("list")
        .is_empty());
    assert_eq!(storage.list_preferences("orders").await.expect("list").len(), 1);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("preferences.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn memory_preferences_clear_matches_grid_id_exactly() {
    let store = MemoryPreferences::new();
    store
        .save_preference(&sorting_key("users"), &json!([]))
        .await
        .expect("save");
    store
        .save_preference(&hidden_key("users"), &json!(["email"]))
        .await
        .expect("save");
    store
        .save_preference(&sorting_key("users.archive"), &json!([]))
        .await
        .expect("save");

    assert_eq!(store.clear_preferences("users").await.expect("clear"), 2);
    assert_eq!(store.len().await, 1);
    assert!(store
        .load_preference(&sorting_key("users.archive"))
        .await
        .expect("load")
        .is_some());
}

#[tokio::test]
async fn sqlite_clear_leaves_dotted_grid_ids_alone() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_preference(&sorting_key("users"), &json!([]))
        .await
        .expect("save");
    storage
        .save_preference(&sorting_key("users.archive"), &json!([]))
        .await
        .expect("save");

    assert_eq!(storage.clear_preferences("users").await.expect("clear"), 1);
    assert_eq!(
        storage
            .list_preferences("users.archive")
            .await
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn sqlite_url_accepts_bare_paths() {
    assert_eq!(
        sqlite_url("./data/grid.db").as_deref(),
        Some("sqlite://./data/grid.db")
    );
    assert_eq!(
        sqlite_url("sqlite:data\\grid.db").as_deref(),
        Some("sqlite://data/grid.db")
    );
    assert_eq!(sqlite_url("sqlite::memory:").as_deref(), Some("sqlite::memory:"));
    assert!(sqlite_url("   ").is_none());
}

#[test]
fn sqlite_path_ignores_memory_urls() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/grid.db?mode=rwc"),
        Some(PathBuf::from("./data/grid.db"))
    );
    assert_eq!(sqlite_path("./grid.db"), Some(PathBuf::from("./grid.db")));
    assert!(sqlite_path("postgres://localhost/grid").is_none());
}
