use std::{collections::BTreeSet, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{ColumnSpec, GridColumn, HiddenColumns, SortSpec},
    error::GridError,
    protocol::{FetchParams, GridEvent, PreferenceKind},
};
use storage::PreferencesStore;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod columns;
pub mod fetch;
pub mod formatters;
pub mod paging;
pub mod preferences;

pub use columns::{normalize_columns, ColumnNormalizer, NormalizedColumns};
pub use fetch::{FetchAction, FetchOutcome, FetchSequencer, FetchTicket};
pub use formatters::{
    DataTypeProviders, DateTimeFormatter, DaysFormatter, MoneyFormatter, ValueFormatter,
};
pub use paging::{PageState, DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZES};
pub use preferences::PreferenceSlot;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Page sizes offered to the renderer.
    pub page_sizes: Vec<u32>,
    pub default_page_size: u32,
    /// Without this no sort parameter is ever sent and sort changes are ignored.
    pub sorting_enabled: bool,
    pub persist_sorting: bool,
    pub persist_hidden_columns: bool,
    pub default_sorting: SortSpec,
    pub default_hidden_columns: HiddenColumns,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            page_sizes: DEFAULT_PAGE_SIZES.to_vec(),
            default_page_size: DEFAULT_PAGE_SIZE,
            sorting_enabled: false,
            persist_sorting: false,
            persist_hidden_columns: false,
            default_sorting: Vec::new(),
            default_hidden_columns: HiddenColumns::new(),
        }
    }
}

/// Everything a renderer needs for one paint.
#[derive(Debug, Clone)]
pub struct GridSnapshot<R> {
    pub columns: Arc<NormalizedColumns>,
    pub rows: Vec<R>,
    pub total: u64,
    pub offset: u64,
    pub current_page: u64,
    pub page_size: u32,
    pub page_count: u64,
    pub page_sizes: Vec<u32>,
    pub sorting_enabled: bool,
    pub sorting: SortSpec,
    pub hidden_columns: HiddenColumns,
    pub selection: Vec<usize>,
    pub loading: bool,
}

/// Displayed page as text: visible headers and formatted cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub headers: Vec<GridColumn>,
    pub cells: Vec<Vec<String>>,
}

struct GridState<R> {
    paging: PageState,
    sorting: SortSpec,
    hidden_columns: HiddenColumns,
    rows: Vec<R>,
    selection: BTreeSet<usize>,
    loading: bool,
    sequencer: FetchSequencer,
}

/// Coordinates paging, sorting, column visibility and selection for one grid
/// and keeps the displayed page in sync with the remote fetch collaborator.
pub struct RemoteGridController<R> {
    grid_id: String,
    options: GridOptions,
    fetch_action: Arc<dyn FetchAction<R>>,
    preferences: Arc<dyn PreferencesStore>,
    providers: DataTypeProviders,
    columns: Mutex<ColumnNormalizer>,
    sorting_slot: PreferenceSlot<SortSpec>,
    hidden_slot: PreferenceSlot<HiddenColumns>,
    state: Mutex<GridState<R>>,
    /// Held from a sort or visibility change through its preference write, so
    /// the store sees writes in the order the state changed.
    write_back: Mutex<()>,
    events: broadcast::Sender<GridEvent>,
}

struct IssuedFetch {
    ticket: FetchTicket,
    params: FetchParams,
}

impl<R> RemoteGridController<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new(
        grid_id: impl Into<String>,
        columns: impl Into<Arc<[ColumnSpec]>>,
        fetch_action: Arc<dyn FetchAction<R>>,
        preferences: Arc<dyn PreferencesStore>,
        options: GridOptions,
    ) -> Result<Arc<Self>, GridError> {
        Self::new_with_providers(
            grid_id,
            columns,
            fetch_action,
            preferences,
            options,
            DataTypeProviders::new(),
        )
    }

    pub fn new_with_providers(
        grid_id: impl Into<String>,
        columns: impl Into<Arc<[ColumnSpec]>>,
        fetch_action: Arc<dyn FetchAction<R>>,
        preferences: Arc<dyn PreferencesStore>,
        options: GridOptions,
        providers: DataTypeProviders,
    ) -> Result<Arc<Self>, GridError> {
        let grid_id = grid_id.into();
        let paging = PageState::new(options.default_page_size)?;
        let sorting_slot = PreferenceSlot::new(
            &grid_id,
            PreferenceKind::Sorting,
            options.sorting_enabled && options.persist_sorting,
        );
        let hidden_slot = PreferenceSlot::new(
            &grid_id,
            PreferenceKind::HiddenColumnsNames,
            options.persist_hidden_columns,
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            columns: Mutex::new(ColumnNormalizer::new(columns.into())),
            state: Mutex::new(GridState {
                paging,
                sorting: options.default_sorting.clone(),
                hidden_columns: options.default_hidden_columns.clone(),
                rows: Vec::new(),
                selection: BTreeSet::new(),
                loading: false,
                sequencer: FetchSequencer::default(),
            }),
            write_back: Mutex::new(()),
            grid_id,
            options,
            fetch_action,
            preferences,
            providers,
            sorting_slot,
            hidden_slot,
            events,
        }))
    }

    pub fn grid_id(&self) -> &str {
        &self.grid_id
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    pub fn providers(&self) -> &DataTypeProviders {
        &self.providers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: GridEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn sort_param(&self, sorting: &SortSpec) -> Option<SortSpec> {
        self.options.sorting_enabled.then(|| sorting.clone())
    }

    /// Issues the initial fetch with default state and applies the stored
    /// preferences while it is in flight. A restored sort that differs from
    /// the default fetches again, superseding the initial fetch.
    pub async fn mount(&self) -> Result<(), GridError> {
        info!(grid_id = %self.grid_id, "mounting grid");
        let initial = self.issue_fetch().await;
        let (initial, restored) = tokio::join!(self.complete_fetch(initial), self.restore());
        initial?;
        restored
    }

    async fn restore(&self) -> Result<(), GridError> {
        let sorting_restored = self.restore_sorting().await;
        let hidden_restored = self.restore_hidden_columns().await;
        let follow_up = match sorting_restored {
            Ok(true) => self.refetch().await.map(|_| ()),
            Ok(false) => Ok(()),
            Err(err) => Err(err),
        };
        follow_up?;
        hidden_restored
    }

    async fn restore_sorting(&self) -> Result<bool, GridError> {
        let _write_back = self.write_back.lock().await;
        let Some(stored) = self.sorting_slot.restore(self.preferences.as_ref()).await? else {
            return Ok(false);
        };
        {
            let mut state = self.state.lock().await;
            if state.sorting == stored {
                return Ok(false);
            }
            state.sorting = stored.clone();
        }
        info!(grid_id = %self.grid_id, keys = stored.len(), "restored sorting preference");
        self.emit(GridEvent::SortingChanged { sorting: stored });
        Ok(true)
    }

    async fn restore_hidden_columns(&self) -> Result<(), GridError> {
        let _write_back = self.write_back.lock().await;
        let Some(stored) = self.hidden_slot.restore(self.preferences.as_ref()).await? else {
            return Ok(());
        };
        {
            let mut state = self.state.lock().await;
            if state.hidden_columns == stored {
                return Ok(());
            }
            state.hidden_columns = stored.clone();
        }
        info!(grid_id = %self.grid_id, hidden = stored.len(), "restored hidden columns preference");
        self.emit(GridEvent::HiddenColumnsChanged {
            hidden_columns: stored,
        });
        Ok(())
    }

    /// Fetches the current window. Only the most recently issued fetch may
    /// replace the displayed rows; an older one resolving later is discarded.
    pub async fn refetch(&self) -> Result<FetchOutcome, GridError> {
        let issued = self.issue_fetch().await;
        self.complete_fetch(issued).await
    }

    /// Takes a ticket and snapshots the request parameters.
    async fn issue_fetch(&self) -> IssuedFetch {
        let (ticket, params, was_loading) = {
            let mut state = self.state.lock().await;
            let ticket = state.sequencer.issue();
            let params = FetchParams {
                offset: state.paging.offset(),
                limit: state.paging.limit(),
                sort: self.sort_param(&state.sorting),
            };
            let was_loading = std::mem::replace(&mut state.loading, true);
            (ticket, params, was_loading)
        };
        if !was_loading {
            self.emit(GridEvent::LoadingChanged { loading: true });
        }
        debug!(
            grid_id = %self.grid_id,
            seq = ticket.seq(),
            offset = params.offset,
            limit = params.limit,
            "issuing fetch"
        );
        IssuedFetch { ticket, params }
    }

    async fn complete_fetch(&self, issued: IssuedFetch) -> Result<FetchOutcome, GridError> {
        let IssuedFetch { ticket, params } = issued;
        let (offset, limit) = (params.offset, params.limit);
        let result = self.fetch_action.fetch(params).await;

        let mut state = self.state.lock().await;
        if !state.sequencer.is_latest(ticket) {
            drop(state);
            debug!(grid_id = %self.grid_id, seq = ticket.seq(), "discarding superseded fetch result");
            return match result {
                Ok(_) => Ok(FetchOutcome::Discarded),
                Err(source) => {
                    warn!(grid_id = %self.grid_id, seq = ticket.seq(), "superseded fetch failed: {source:#}");
                    Err(GridError::Fetch {
                        offset,
                        limit,
                        source,
                    })
                }
            };
        }

        state.loading = false;
        match result {
            Ok(page) => {
                let row_count = page.rows.len();
                let total = page.total;
                state.paging.set_total(total);
                state.rows = page.rows;
                let had_selection = !state.selection.is_empty();
                state.selection.clear();
                drop(state);

                debug!(grid_id = %self.grid_id, seq = ticket.seq(), row_count, total, "applied fetch result");
                self.emit(GridEvent::RowsReplaced { row_count, total });
                if had_selection {
                    self.emit(GridEvent::SelectionChanged {
                        selection: Vec::new(),
                    });
                }
                self.emit(GridEvent::LoadingChanged { loading: false });
                Ok(FetchOutcome::Applied)
            }
            Err(source) => {
                drop(state);
                warn!(grid_id = %self.grid_id, offset, limit, "fetch failed: {source:#}");
                self.emit(GridEvent::LoadingChanged { loading: false });
                Err(GridError::Fetch {
                    offset,
                    limit,
                    source,
                })
            }
        }
    }

    pub async fn set_page(&self, page: u64) -> Result<(), GridError> {
        let paging = {
            let mut state = self.state.lock().await;
            if !state.paging.set_page(page) {
                return Ok(());
            }
            state.paging
        };
        self.paging_changed(paging).await
    }

    /// Always returns to the first page, whatever the current offset.
    pub async fn set_page_size(&self, limit: u32) -> Result<(), GridError> {
        let paging = {
            let mut state = self.state.lock().await;
            if !state.paging.set_page_size(limit)? {
                return Ok(());
            }
            state.paging
        };
        self.paging_changed(paging).await
    }

    async fn paging_changed(&self, paging: PageState) -> Result<(), GridError> {
        debug!(
            grid_id = %self.grid_id,
            offset = paging.offset(),
            limit = paging.limit(),
            "paging changed"
        );
        self.emit(GridEvent::PagingChanged {
            current_page: paging.current_page(),
            page_size: paging.limit(),
        });
        self.refetch().await.map(|_| ())
    }

    /// Replaces the sort outright. Ignored when sorting is disabled.
    pub async fn set_sort(&self, sorting: SortSpec) -> Result<(), GridError> {
        if !self.options.sorting_enabled {
            debug!(grid_id = %self.grid_id, "sorting disabled; ignoring sort change");
            return Ok(());
        }
        let persisted = {
            let _write_back = self.write_back.lock().await;
            {
                let mut state = self.state.lock().await;
                if state.sorting == sorting {
                    return Ok(());
                }
                state.sorting = sorting.clone();
            }
            debug!(grid_id = %self.grid_id, keys = sorting.len(), "sorting changed");
            self.emit(GridEvent::SortingChanged {
                sorting: sorting.clone(),
            });
            self.sorting_slot
                .persist(self.preferences.as_ref(), &sorting)
                .await
        };
        let fetched = self.refetch().await;
        persisted?;
        fetched.map(|_| ())
    }

    /// Replaces the hidden-column set. Visibility never refetches.
    pub async fn set_hidden_columns(&self, hidden_columns: HiddenColumns) -> Result<(), GridError> {
        self.update_hidden_columns(move |hidden| *hidden = hidden_columns)
            .await
    }

    pub async fn set_column_hidden(&self, column: &str, hidden: bool) -> Result<(), GridError> {
        self.update_hidden_columns(|columns| {
            if hidden {
                columns.insert(column.to_string());
            } else {
                columns.remove(column);
            }
        })
        .await
    }

    async fn update_hidden_columns(
        &self,
        update: impl FnOnce(&mut HiddenColumns),
    ) -> Result<(), GridError> {
        let _write_back = self.write_back.lock().await;
        let hidden_columns = {
            let mut state = self.state.lock().await;
            let mut next = state.hidden_columns.clone();
            update(&mut next);
            if state.hidden_columns == next {
                return Ok(());
            }
            state.hidden_columns = next.clone();
            next
        };
        debug!(grid_id = %self.grid_id, hidden = hidden_columns.len(), "hidden columns changed");
        self.emit(GridEvent::HiddenColumnsChanged {
            hidden_columns: hidden_columns.clone(),
        });
        self.hidden_slot
            .persist(self.preferences.as_ref(), &hidden_columns)
            .await?;
        Ok(())
    }

    /// Selects rows of the displayed page by index. Indices past the page are
    /// dropped. Returns the effective selection.
    pub async fn set_selection(&self, indices: Vec<usize>) -> Vec<usize> {
        let selection: Vec<usize> = {
            let mut state = self.state.lock().await;
            let row_count = state.rows.len();
            state.selection = indices.into_iter().filter(|i| *i < row_count).collect();
            state.selection.iter().copied().collect()
        };
        self.emit(GridEvent::SelectionChanged {
            selection: selection.clone(),
        });
        selection
    }

    pub async fn selected_rows(&self) -> Vec<R> {
        let state = self.state.lock().await;
        state
            .selection
            .iter()
            .filter_map(|i| state.rows.get(*i).cloned())
            .collect()
    }

    pub async fn set_columns(&self, columns: impl Into<Arc<[ColumnSpec]>>) -> bool {
        let rebuilt = self.columns.lock().await.update(columns.into());
        if rebuilt {
            debug!(grid_id = %self.grid_id, "column list changed; normalized again");
        }
        rebuilt
    }

    pub async fn columns(&self) -> Arc<NormalizedColumns> {
        self.columns.lock().await.normalized()
    }

    pub async fn snapshot(&self) -> GridSnapshot<R> {
        let columns = self.columns().await;
        let state = self.state.lock().await;
        GridSnapshot {
            columns,
            rows: state.rows.clone(),
            total: state.paging.total(),
            offset: state.paging.offset(),
            current_page: state.paging.current_page(),
            page_size: state.paging.limit(),
            page_count: state.paging.page_count(),
            page_sizes: self.options.page_sizes.clone(),
            sorting_enabled: self.options.sorting_enabled,
            sorting: state.sorting.clone(),
            hidden_columns: state.hidden_columns.clone(),
            selection: state.selection.iter().copied().collect(),
            loading: state.loading,
        }
    }
}

impl<R> RemoteGridController<R>
where
    R: Clone + Send + Sync + Serialize + 'static,
{
    /// Formats the displayed rows over the visible columns, in column order.
    pub async fn render_page(&self) -> Result<RenderedPage, GridError> {
        let columns = self.columns().await;
        let (rows, hidden_columns) = {
            let state = self.state.lock().await;
            (state.rows.clone(), state.hidden_columns.clone())
        };

        let headers: Vec<GridColumn> = columns
            .columns
            .iter()
            .filter(|c| !hidden_columns.contains(&c.name))
            .cloned()
            .collect();

        let mut cells = Vec::with_capacity(rows.len());
        for row in &rows {
            let value = serde_json::to_value(row)?;
            let line = headers
                .iter()
                .map(|column| match value.get(column.name.as_str()) {
                    Some(cell) => self.providers.format_cell(&column.name, cell),
                    None => self.providers.format_cell(&column.name, &Value::Null),
                })
                .collect();
            cells.push(line);
        }

        Ok(RenderedPage { headers, cells })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
