use std::path::{Path, PathBuf};

use anyhow::Context;
use config::{Config, Environment, File};
use grid_core::{GridOptions, DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZES};
use serde::Deserialize;
use storage::sqlite_url;

const DEFAULT_SETTINGS_FILE: &str = "grid.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grid_id: String,
    pub database_url: String,
    pub page_sizes: Vec<u32>,
    pub default_page_size: u32,
    pub sorting_enabled: bool,
    pub persist_sorting: bool,
    pub persist_hidden_columns: bool,
    /// Artificial delay for every fetch of the demo data source.
    pub fetch_latency_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid_id: "EXAMPLE_TABLE".into(),
            database_url: "sqlite://./data/grid.db".into(),
            page_sizes: DEFAULT_PAGE_SIZES.to_vec(),
            default_page_size: DEFAULT_PAGE_SIZE,
            sorting_enabled: true,
            persist_sorting: true,
            persist_hidden_columns: true,
            fetch_latency_ms: 0,
        }
    }
}

impl Settings {
    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            page_sizes: self.page_sizes.clone(),
            default_page_size: self.default_page_size,
            sorting_enabled: self.sorting_enabled,
            persist_sorting: self.persist_sorting,
            persist_hidden_columns: self.persist_hidden_columns,
            ..GridOptions::default()
        }
    }
}

/// Defaults, then `grid.toml` (or `path`, which must exist), then `GRID__*`
/// environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with_env(path, grid_environment())
}

fn grid_environment() -> Environment {
    Environment::with_prefix("GRID")
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("page_sizes")
        .try_parsing(true)
}

fn load_settings_with_env(path: Option<&Path>, env: Environment) -> anyhow::Result<Settings> {
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));

    let mut settings: Settings = Config::builder()
        .add_source(File::from(file.as_path()).required(path.is_some()))
        .add_source(env)
        .build()
        .with_context(|| format!("failed to read settings from '{}'", file.display()))?
        .try_deserialize()
        .context("invalid grid settings")?;

    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    sqlite_url(raw_database_url).unwrap_or_else(|| Settings::default().database_url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
