//! Error types for StrataDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using StrataError.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Errors that can occur in StrataDB operations.
#[derive(Debug, Error)]
pub enum StrataError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Page format errors
    #[error("Page corrupted: {page_id}, reason: {reason}")]
    PageCorrupted { page_id: PageId, reason: String },

    #[error("Page full, unable to insert tuple")]
    PageFull,

    #[error("Invalid page: {page_id} (file has {num_pages} pages)")]
    InvalidPage { page_id: PageId, num_pages: u32 },

    // Tuple placement errors
    #[error("Tuple not on page {page_id}: {reason}")]
    TupleNotOnPage { page_id: PageId, reason: String },

    #[error("Slot {slot} on page {page_id} is already empty")]
    SlotEmpty { page_id: PageId, slot: u16 },

    #[error("Tuple has no record id")]
    TupleNotPlaced,

    // Schema errors
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // Iteration errors
    #[error("Iterator state error: {0}")]
    IteratorState(&'static str),

    // Cache errors
    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Table not found: {0}")]
    TableNotFound(u32),

    // Transaction errors
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Returns true if the error only means the target page had no free slot.
    ///
    /// HeapFile inserts treat this as a signal to try the next page.
    pub fn is_page_full(&self) -> bool {
        matches!(self, StrataError::PageFull)
    }
}
