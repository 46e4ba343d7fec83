//! Heap storage implementation.
//!
//! This module provides heap-based tuple storage with:
//! - PageLayout: slot count and offsets for one page and tuple size
//! - HeapPage: bitmap page format for fixed-size tuples
//! - HeapFile: page-addressed table file and tuple-level access
//! - HeapFileIterator: sequential scan through a page cache

mod file;
mod iter;
mod layout;
mod page;

pub use file::{HeapFile, HeapFileConfig};
pub use iter::{HeapFileIterator, TupleIterator};
pub use layout::PageLayout;
pub use page::{HeapPage, HeapPageIterator};
