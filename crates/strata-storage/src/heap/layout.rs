//! Heap page geometry.
//!
//! Page layout:
//! ```text
//! +--------------------------+
//! | Header bitmap            |  ceil(num_slots / 8) bytes, bit i = slot i used
//! +--------------------------+
//! | Slot 0                   |  tuple_size bytes each
//! | Slot 1                   |
//! | ...                      |
//! +--------------------------+
//! | Zero padding             |  up to page_size
//! +--------------------------+
//! ```
//!
//! Each slot costs `tuple_size * 8 + 1` bits: its data plus one header bit.

use strata_common::page::MAX_PAGE_SIZE;
use strata_common::{Result, StrataError};

/// Derived sizes for one (page size, tuple size) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    tuple_size: usize,
    num_slots: usize,
    header_size: usize,
}

impl PageLayout {
    /// Computes the layout, failing if not even one tuple fits.
    pub fn new(page_size: usize, tuple_size: usize) -> Result<Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(StrataError::ConfigError(format!(
                "page size {} outside 1..={}",
                page_size, MAX_PAGE_SIZE
            )));
        }
        if tuple_size == 0 {
            return Err(StrataError::InvalidSchema(
                "tuple size must be positive".to_string(),
            ));
        }

        let num_slots = tuple_size
            .checked_mul(8)
            .and_then(|bits| bits.checked_add(1))
            .map_or(0, |slot_bits| (page_size * 8) / slot_bits);
        if num_slots == 0 {
            return Err(StrataError::InvalidSchema(format!(
                "tuple of {} bytes does not fit in a {} byte page",
                tuple_size, page_size
            )));
        }

        Ok(Self {
            page_size,
            tuple_size,
            num_slots,
            header_size: num_slots.div_ceil(8),
        })
    }

    /// Page size in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Bytes per slot.
    #[inline]
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Number of tuple slots per page.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Bytes occupied by the header bitmap.
    #[inline]
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Byte offset of `slot` from the start of the page.
    #[inline]
    pub fn slot_offset(&self, slot: usize) -> usize {
        self.header_size + slot * self.tuple_size
    }

    /// Bytes of zero padding after the last slot.
    #[inline]
    pub fn padding(&self) -> usize {
        self.page_size - self.slot_offset(self.num_slots)
    }
}
