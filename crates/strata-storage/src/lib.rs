//! Storage engine for StrataDB.
//!
//! This crate provides:
//! - Tuple representation and serialization
//! - Heap pages with a slot-occupancy bitmap and fixed-size tuple slots
//! - HeapFile for mapping a table onto a sequence of pages in one file
//! - The page cache contract heap files route page accesses through

mod cache;
mod disk;
mod heap;
mod tuple;

#[cfg(test)]
mod testing;

pub use cache::{AccessMode, PageCache, PageGuard, SharedPage};
pub use disk::DataFile;
pub use heap::{
    HeapFile, HeapFileConfig, HeapFileIterator, HeapPage, HeapPageIterator, PageLayout,
    TupleIterator,
};
pub use tuple::{RecordId, Tuple};
