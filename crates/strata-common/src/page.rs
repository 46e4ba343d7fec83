//! Page identifiers and page size limits.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (4 KB).
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Largest supported page size. Slot indexes are stored as `u16`.
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Unique identifier for a page within a table.
///
/// PageId consists of a table ID and the page number within that table's
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    /// Table identifier (derived from the backing file's path).
    pub table_id: u32,
    /// Page number within the table (0-indexed).
    pub page_num: u32,
}

impl PageId {
    /// Creates a new PageId.
    pub fn new(table_id: u32, page_num: u32) -> Self {
        Self { table_id, page_num }
    }

    /// Returns the PageId as a single u64 for compact storage.
    pub fn as_u64(&self) -> u64 {
        ((self.table_id as u64) << 32) | (self.page_num as u64)
    }

    /// Creates a PageId from a u64 representation.
    pub fn from_u64(value: u64) -> Self {
        Self {
            table_id: (value >> 32) as u32,
            page_num: value as u32,
        }
    }

    /// Byte offset of this page inside its table's resource.
    pub fn byte_offset(&self, page_size: usize) -> u64 {
        self.page_num as u64 * page_size as u64
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_num)
    }
}
