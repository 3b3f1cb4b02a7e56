use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use grid_core::{
    DataTypeProviders, DateTimeFormatter, DaysFormatter, FetchAction, GridSnapshot,
    MoneyFormatter, RemoteGridController, RenderedPage,
};
use shared::domain::{SortDirection, Sorting};
use storage::{PreferencesStore, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod users;

use config::{load_settings, normalize_database_url};
use users::{generate_users, user_columns, DemoUser, UserDirectory, DEMO_USER_COUNT};

#[derive(Parser, Debug)]
struct Cli {
    /// Settings file; defaults to ./grid.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    grid_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount the grid, apply the given interactions in order and print the page.
    Show {
        #[arg(long)]
        page_size: Option<u32>,
        /// Sort keys such as `balance:desc,name`.
        #[arg(long, value_delimiter = ',')]
        sort: Vec<String>,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long, value_delimiter = ',')]
        hide: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        unhide: Vec<String>,
        #[arg(long, default_value_t = DEMO_USER_COUNT)]
        rows: usize,
    },
    /// Print the stored preferences of the grid.
    Preferences,
    /// Forget the stored preferences of the grid.
    ResetPreferences,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        settings.database_url = normalize_database_url(&url);
    }
    if let Some(grid_id) = cli.grid_id {
        settings.grid_id = grid_id;
    }

    let storage = Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open preferences at '{}'", settings.database_url))?;
    info!(grid_id = %settings.grid_id, database_url = %settings.database_url, "preferences store ready");

    match cli.command {
        Command::Show {
            page_size,
            sort,
            page,
            hide,
            unhide,
            rows,
        } => {
            let fetch_action: Arc<dyn FetchAction<DemoUser>> = Arc::new(UserDirectory::new(
                generate_users(rows),
                Duration::from_millis(settings.fetch_latency_ms),
            ));
            let preferences: Arc<dyn PreferencesStore> = Arc::new(storage);
            let grid = RemoteGridController::new_with_providers(
                settings.grid_id.clone(),
                user_columns(),
                fetch_action,
                preferences,
                settings.grid_options(),
                demo_providers(),
            )?;

            grid.mount().await?;
            if let Some(limit) = page_size {
                grid.set_page_size(limit).await?;
            }
            if !sort.is_empty() {
                let spec = sort
                    .iter()
                    .map(|raw| parse_sort_key(raw))
                    .collect::<Result<Vec<_>>>()?;
                grid.set_sort(spec).await?;
            }
            if let Some(page) = page {
                grid.set_page(page).await?;
            }
            for column in &hide {
                grid.set_column_hidden(column, true).await?;
            }
            for column in &unhide {
                grid.set_column_hidden(column, false).await?;
            }

            let rendered = grid.render_page().await?;
            let snapshot = grid.snapshot().await;
            print_page(&rendered, &snapshot);
        }
        Command::Preferences => {
            let stored = storage.list_preferences(&settings.grid_id).await?;
            if stored.is_empty() {
                println!("no stored preferences for grid '{}'", settings.grid_id);
            }
            for pref in stored {
                println!(
                    "{} = {} (updated {})",
                    pref.key.namespaced(),
                    pref.value,
                    pref.updated_at.to_rfc3339()
                );
            }
        }
        Command::ResetPreferences => {
            let removed = storage.clear_preferences(&settings.grid_id).await?;
            println!(
                "removed {removed} stored preference(s) for grid '{}'",
                settings.grid_id
            );
        }
    }

    Ok(())
}

fn demo_providers() -> DataTypeProviders {
    DataTypeProviders::new()
        .provide(["balance"], MoneyFormatter::default())
        .provide(["registered_at"], DateTimeFormatter)
        .provide(["trial_days"], DaysFormatter::default())
}

/// `column` or `column:asc|desc`.
fn parse_sort_key(raw: &str) -> Result<Sorting> {
    let (column, direction) = match raw.split_once(':') {
        Some((column, direction)) => (column.trim(), direction.trim()),
        None => (raw.trim(), "asc"),
    };
    if column.is_empty() {
        return Err(anyhow!("empty column in sort key '{raw}'"));
    }
    let direction = if direction.eq_ignore_ascii_case("asc") {
        SortDirection::Asc
    } else if direction.eq_ignore_ascii_case("desc") {
        SortDirection::Desc
    } else {
        return Err(anyhow!("unknown sort direction '{direction}' in '{raw}'"));
    };
    Ok(Sorting {
        column_name: column.to_string(),
        direction,
    })
}

fn print_page<R>(rendered: &RenderedPage, snapshot: &GridSnapshot<R>) {
    let mut widths: Vec<usize> = rendered
        .headers
        .iter()
        .map(|c| c.title.chars().count())
        .collect();
    for line in &rendered.cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!(
        "{}",
        format_line(rendered.headers.iter().map(|c| c.title.as_str()).collect())
    );
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    for line in &rendered.cells {
        println!("{}", format_line(line.iter().map(String::as_str).collect()));
    }

    let sorting = if snapshot.sorting.is_empty() {
        "none".to_string()
    } else {
        snapshot
            .sorting
            .iter()
            .map(|s| {
                let dir = match s.direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                };
                format!("{}:{dir}", s.column_name)
            })
            .collect::<Vec<_>>()
            .join(",")
    };
    println!(
        "page {} of {} | {} rows total | page size {} (offered {:?}) | sort {} | hidden {:?}",
        snapshot.current_page + 1,
        snapshot.page_count.max(1),
        snapshot.total,
        snapshot.page_size,
        snapshot.page_sizes,
        if snapshot.sorting_enabled {
            sorting.as_str()
        } else {
            "disabled"
        },
        snapshot.hidden_columns,
    );
}
