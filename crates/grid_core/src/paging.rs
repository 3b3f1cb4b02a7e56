//! Offset/limit window over the remote row set.

use shared::error::GridError;

pub const DEFAULT_PAGE_SIZES: [u32; 5] = [2, 10, 50, 100, 500];
pub const DEFAULT_PAGE_SIZE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    offset: u64,
    limit: u32,
    total: u64,
}

impl PageState {
    pub fn new(limit: u32) -> Result<Self, GridError> {
        if limit == 0 {
            return Err(GridError::InvalidPageSize);
        }
        Ok(Self {
            offset: 0,
            limit,
            total: 0,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current_page(&self) -> u64 {
        self.offset / u64::from(self.limit)
    }

    /// Number of pages the last known total spans.
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit))
    }

    /// Moves to `page`. Not clamped against the total: pages past the end are
    /// requested as-is. Returns whether the offset changed.
    pub fn set_page(&mut self, page: u64) -> bool {
        let offset = page.saturating_mul(u64::from(self.limit));
        let changed = offset != self.offset;
        self.offset = offset;
        changed
    }

    /// Changing the page size always goes back to the first page.
    /// Returns whether offset or limit changed.
    pub fn set_page_size(&mut self, limit: u32) -> Result<bool, GridError> {
        if limit == 0 {
            return Err(GridError::InvalidPageSize);
        }
        let changed = self.offset != 0 || self.limit != limit;
        self.offset = 0;
        self.limit = limit;
        Ok(changed)
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }
}
