use thiserror::Error;

use crate::protocol::PreferenceKey;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("fetch failed for offset {offset} limit {limit}: {source}")]
    Fetch {
        offset: u64,
        limit: u32,
        source: anyhow::Error,
    },
    #[error("preference store failed for '{}': {source}", .key.namespaced())]
    Preferences {
        key: PreferenceKey,
        source: anyhow::Error,
    },
    #[error("stored preference '{}' could not be decoded: {source}", .key.namespaced())]
    PreferenceDecode {
        key: PreferenceKey,
        source: serde_json::Error,
    },
    #[error("page size must be positive")]
    InvalidPageSize,
    #[error("row could not be converted for rendering: {0}")]
    RowEncoding(#[from] serde_json::Error),
}

impl GridError {
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
