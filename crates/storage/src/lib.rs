use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::Mutex;

use shared::protocol::{PreferenceKey, PreferenceKind};

/// Keyed persistence for per-grid UI preferences. The store is owned by the
/// caller and shared by grid identity; controllers only read and write slots.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn load_preference(&self, key: &PreferenceKey) -> Result<Option<Value>>;
    async fn save_preference(&self, key: &PreferenceKey, value: &Value) -> Result<()>;
    async fn clear_preferences(&self, grid_id: &str) -> Result<u64>;
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: Arc<Mutex<HashMap<PreferenceKey, Value>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }
}

#[async_trait]
impl PreferencesStore for MemoryPreferences {
    async fn load_preference(&self, key: &PreferenceKey) -> Result<Option<Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn save_preference(&self, key: &PreferenceKey, value: &Value) -> Result<()> {
        self.values.lock().await.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn clear_preferences(&self, grid_id: &str) -> Result<u64> {
        let mut values = self.values.lock().await;
        let before = values.len();
        values.retain(|key, _| key.grid_id != grid_id);
        Ok((before - values.len()) as u64)
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredPreference {
    pub key: PreferenceKey,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    /// Accepts a `sqlite:` url or a bare file path.
    pub async fn new(database_url: &str) -> Result<Self> {
        let database_url =
            sqlite_url(database_url).ok_or_else(|| anyhow!("database url is empty"))?;
        ensure_sqlite_parent_dir_exists(&database_url)?;

        let connect_options =
            SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// All stored slots for one grid, ordered by kind.
    pub async fn list_preferences(&self, grid_id: &str) -> Result<Vec<StoredPreference>> {
        let rows = sqlx::query(
            "SELECT kind, value_json, updated_at FROM grid_preferences
             WHERE grid_id = ? ORDER BY kind",
        )
        .bind(grid_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_kind: String = row.try_get("kind")?;
            let Some(kind) = PreferenceKind::parse(&raw_kind) else {
                continue;
            };
            let raw_value: String = row.try_get("value_json")?;
            let value = serde_json::from_str(&raw_value).with_context(|| {
                format!("stored preference {grid_id}.{raw_kind} is not valid json")
            })?;
            out.push(StoredPreference {
                key: PreferenceKey::new(grid_id, kind),
                value,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl PreferencesStore for Storage {
    async fn load_preference(&self, key: &PreferenceKey) -> Result<Option<Value>> {
        let row =
            sqlx::query("SELECT value_json FROM grid_preferences WHERE grid_id = ? AND kind = ?")
                .bind(&key.grid_id)
                .bind(key.kind.as_str())
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("failed to load preference {}", key.namespaced()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get(0)?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("stored preference {} is not valid json", key.namespaced()))?;
        Ok(Some(value))
    }

    async fn save_preference(&self, key: &PreferenceKey, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO grid_preferences (grid_id, kind, value_json, updated_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(grid_id, kind) DO UPDATE SET value_json = excluded.value_json, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&key.grid_id)
        .bind(key.kind.as_str())
        .bind(raw)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save preference {}", key.namespaced()))?;
        Ok(())
    }

    async fn clear_preferences(&self, grid_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM grid_preferences WHERE grid_id = ?")
            .bind(grid_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// Canonical `sqlite://` form of a url or bare path; `None` when blank.
/// Memory urls and urls of other schemes pass through untouched.
pub fn sqlite_url(raw_database_url: &str) -> Option<String> {
    let raw = raw_database_url.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("sqlite::memory:") || raw.contains("://") {
        return Some(raw.to_string());
    }
    let path = raw.strip_prefix("sqlite:").unwrap_or(raw).replace('\\', "/");
    Some(format!("sqlite://{path}"))
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    let url = sqlite_url(database_url)?;
    let path = url.strip_prefix("sqlite://")?.split('?').next()?;
    if path.is_empty() {
        return None;
    }
    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
