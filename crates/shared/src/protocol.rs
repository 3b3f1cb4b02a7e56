use serde::{Deserialize, Serialize};

use crate::domain::{HiddenColumns, SortSpec};

/// Parameters handed to the remote fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    pub offset: u64,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

/// One page of rows plus the size of the whole matching set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult<T> {
    pub rows: Vec<T>,
    pub total: u64,
}

impl<T> FetchResult<T> {
    pub fn new(rows: Vec<T>, total: u64) -> Self {
        Self { rows, total }
    }

    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreferenceKind {
    #[serde(rename = "sorting")]
    Sorting,
    #[serde(rename = "hiddenColumnsNames")]
    HiddenColumnsNames,
}

impl PreferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sorting => "sorting",
            Self::HiddenColumnsNames => "hiddenColumnsNames",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sorting" => Some(Self::Sorting),
            "hiddenColumnsNames" => Some(Self::HiddenColumnsNames),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreferenceKey {
    pub grid_id: String,
    pub kind: PreferenceKind,
}

impl PreferenceKey {
    pub fn new(grid_id: impl Into<String>, kind: PreferenceKind) -> Self {
        Self {
            grid_id: grid_id.into(),
            kind,
        }
    }

    /// `<grid_id>.<kind>`, the key other stores (e.g. browser local storage) use.
    pub fn namespaced(&self) -> String {
        format!("{}.{}", self.grid_id, self.kind.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GridEvent {
    LoadingChanged {
        loading: bool,
    },
    RowsReplaced {
        row_count: usize,
        total: u64,
    },
    PagingChanged {
        current_page: u64,
        page_size: u32,
    },
    SortingChanged {
        sorting: SortSpec,
    },
    HiddenColumnsChanged {
        hidden_columns: HiddenColumns,
    },
    SelectionChanged {
        selection: Vec<usize>,
    },
}
