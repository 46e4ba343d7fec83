//! StrataDB common types, errors, and utilities.
//!
//! This crate provides shared definitions used across all StrataDB components.

pub mod config;
pub mod error;
pub mod page;
pub mod schema;
pub mod transaction;
pub mod types;

pub use config::StorageConfig;
pub use error::{Result, StrataError};
pub use page::{PageId, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use schema::{Field, Schema};
pub use transaction::TransactionId;
pub use types::{CodecError, FieldType, Value};
