//! Offset/limit pagination shared by every list query.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Pagination window (`offset` rows skipped, at most `limit` returned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Build a page from optional caller input.
    ///
    /// A limit of zero or above [`MAX_PAGE_SIZE`] is rejected rather than clamped.
    pub fn new(offset: Option<u32>, limit: Option<u32>) -> DomainResult<Self> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 {
            return Err(DomainError::validation("page size must be at least 1"));
        }
        if limit > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "page size must not exceed {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self {
            offset: offset.unwrap_or(0),
            limit,
        })
    }

    /// Apply this window to an in-memory iterator.
    pub fn slice<T, I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let page = Page::new(None, None).unwrap();
        assert_eq!(page, Page { offset: 0, limit: 100 });
    }

    #[test]
    fn oversize_and_empty_pages_are_rejected() {
        assert!(Page::new(None, Some(501)).is_err());
        assert!(Page::new(None, Some(0)).is_err());
        assert!(Page::new(Some(10), Some(500)).is_ok());
    }

    #[test]
    fn slice_skips_and_takes() {
        let page = Page::new(Some(2), Some(2)).unwrap();
        assert_eq!(page.slice(1..=10), vec![3, 4]);
    }
}
