use std::ops::Range;

use crate::error::{DomainError, DomainResult};

/// Slice of a tenant's ordered keyspace selected by a page request.
///
/// Every backend derives its page from this window so that the paging
/// arithmetic stays identical across storage implementations:
/// - `page_count = ceil(count / limit)`
/// - a page starting beyond `count` yields an empty window
/// - otherwise the window holds `limit` rows, or the remaining rows on the
///   final (or only) page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub size: usize,
    pub last_page_index: i64,
}

impl PageWindow {
    pub fn compute(count: usize, limit: usize, page: usize) -> DomainResult<Self> {
        if limit == 0 {
            return Err(DomainError::InvalidPageRequest(
                "Page limit must be greater than zero".to_string(),
            ));
        }

        let page_count = count.div_ceil(limit);
        let last_page_index = page_count as i64 - 1;

        // Out of range: report where paging ends without serving the request
        let offset = match page.checked_mul(limit) {
            Some(offset) if offset <= count => offset,
            _ => {
                return Ok(Self {
                    offset: 0,
                    size: 0,
                    last_page_index,
                })
            }
        };

        let remaining = count - offset;
        let is_final_page = page + 1 == page_count;
        let size = if page_count == 1 || (is_final_page && remaining < limit) {
            remaining
        } else {
            limit.min(remaining)
        };

        Ok(Self {
            offset,
            size,
            last_page_index,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Ordinal positions covered by this window
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }
}
