use std::sync::Arc;

use anyhow::Result;
use grid_core::{FetchAction, GridOptions, RemoteGridController};
use shared::{
    domain::{ColumnSpec, SortDirection, Sorting},
    protocol::{FetchParams, FetchResult},
};
use storage::{PreferencesStore, Storage};

fn columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("id", "ID"),
        ColumnSpec::new("name", "Name"),
        ColumnSpec::new("email", "Email"),
    ]
}

fn letters_source() -> Arc<dyn FetchAction<String>> {
    Arc::new(|params: FetchParams| async move {
        let mut letters: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();
        if let Some(first) = params.sort.as_ref().and_then(|s| s.first()) {
            if first.direction == SortDirection::Desc {
                letters.reverse();
            }
        }
        let total = letters.len() as u64;
        let rows: Vec<String> = letters
            .into_iter()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .collect();
        Ok::<_, anyhow::Error>(FetchResult::new(rows, total))
    })
}

fn options() -> GridOptions {
    GridOptions {
        sorting_enabled: true,
        persist_sorting: true,
        persist_hidden_columns: true,
        ..GridOptions::default()
    }
}

#[tokio::test]
async fn preferences_written_by_one_mount_are_restored_by_the_next() -> Result<()> {
    let temp_root = tempfile::tempdir()?;
    let db_path = temp_root.path().join("grid.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage: Arc<dyn PreferencesStore> = Arc::new(Storage::new(&database_url).await?);

    let first = RemoteGridController::new(
        "letters",
        columns(),
        letters_source(),
        Arc::clone(&storage),
        options(),
    )?;
    first.mount().await?;
    assert_eq!(first.snapshot().await.rows, vec!["a", "b"]);

    first.set_sort(vec![Sorting::desc("name")]).await?;
    first.set_column_hidden("email", true).await?;
    assert_eq!(first.snapshot().await.rows, vec!["z", "y"]);
    drop(first);

    let second = RemoteGridController::new(
        "letters",
        columns(),
        letters_source(),
        Arc::clone(&storage),
        options(),
    )?;
    second.mount().await?;

    let snapshot = second.snapshot().await;
    assert_eq!(snapshot.sorting, vec![Sorting::desc("name")]);
    assert!(snapshot.hidden_columns.contains("email"));
    assert_eq!(snapshot.rows, vec!["z", "y"]);
    assert_eq!(snapshot.total, 26);

    let other_grid = RemoteGridController::new(
        "other",
        columns(),
        letters_source(),
        storage,
        options(),
    )?;
    other_grid.mount().await?;
    assert!(other_grid.snapshot().await.sorting.is_empty());
    Ok(())
}
