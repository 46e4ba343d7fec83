//! HeapFile: one table's tuples laid out over a sequence of heap pages.
//!
//! Page `n` lives at byte offset `n * page_size` of the table's data file.
//! All page accesses made on behalf of a transaction are routed through a
//! [`PageCache`]; only `read_page` and `write_page` touch the file directly,
//! and those are what the cache itself calls to load and write back pages.

use super::iter::HeapFileIterator;
use super::layout::PageLayout;
use super::page::HeapPage;
use crate::cache::{AccessMode, PageCache};
use crate::disk::DataFile;
use crate::tuple::{RecordId, Tuple};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_common::page::{PageId, DEFAULT_PAGE_SIZE};
use strata_common::{Result, Schema, StorageConfig, StrataError, TransactionId};
use tracing::{debug, trace};

/// Configuration for HeapFile.
#[derive(Debug, Clone)]
pub struct HeapFileConfig {
    /// Page size in bytes.
    pub page_size: usize,
    /// Sync the data file after every page write.
    pub fsync_enabled: bool,
}

impl Default for HeapFileConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fsync_enabled: false,
        }
    }
}

impl From<&StorageConfig> for HeapFileConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            page_size: config.page_size,
            fsync_enabled: config.fsync_enabled,
        }
    }
}

/// A table stored as an unordered collection of fixed-size tuples.
///
/// HeapFile performs no locking. Concurrent callers rely on the page cache
/// for page-level isolation, and concurrent inserts into one table must be
/// serialized by the caller.
#[derive(Debug)]
pub struct HeapFile {
    /// Canonical path of the data file.
    path: PathBuf,
    /// The data file.
    data: DataFile,
    /// Schema of every tuple in the table.
    schema: Arc<Schema>,
    /// Page geometry for this schema and page size.
    layout: PageLayout,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating an empty file if needed.
    ///
    /// Fails if not even one tuple of `schema` fits on a page.
    pub fn open(path: impl AsRef<Path>, schema: Arc<Schema>, config: HeapFileConfig) -> Result<Self> {
        let layout = PageLayout::new(config.page_size, schema.tuple_size())?;
        let data = DataFile::open(path.as_ref(), config.fsync_enabled)?;
        let path = std::fs::canonicalize(path.as_ref())?;

        let file = Self {
            path,
            data,
            schema,
            layout,
        };
        debug!(
            path = %file.path.display(),
            table_id = file.table_id(),
            num_slots = layout.num_slots(),
            "opened heap file"
        );
        Ok(file)
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the table ID: the CRC-32 of the canonical path.
    ///
    /// Stable across opens of the same file. Distinct files may collide.
    pub fn table_id(&self) -> u32 {
        crc32fast::hash(self.path.to_string_lossy().as_bytes())
    }

    /// Returns the table's schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    /// Returns the page geometry.
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Returns the number of pages, counting a trailing partial page.
    ///
    /// Computed from the current file length on every call.
    pub fn num_pages(&self) -> Result<u32> {
        let len = self.data.len()?;
        Ok(len.div_ceil(self.layout.page_size() as u64) as u32)
    }

    /// Reads and decodes a page directly from the file.
    ///
    /// Fails with `InvalidPage` if the page belongs to another table or
    /// lies past the end of the file.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        let num_pages = self.num_pages()?;
        if page_id.table_id != self.table_id() || page_id.page_num >= num_pages {
            return Err(StrataError::InvalidPage { page_id, num_pages });
        }

        let mut buf = HeapPage::create_empty_page_data(self.layout.page_size());
        self.data
            .read_at(page_id.byte_offset(self.layout.page_size()), &mut buf)?;
        trace!(%page_id, "read page");

        HeapPage::from_bytes(page_id, Arc::clone(&self.schema), self.layout.page_size(), &buf)
    }

    /// Writes a page at its offset and makes the written bytes its new
    /// before-image.
    pub fn write_page(&self, page: &mut HeapPage) -> Result<()> {
        let page_id = page.page_id();
        if page_id.table_id != self.table_id() {
            return Err(StrataError::InvalidPage {
                page_id,
                num_pages: self.num_pages()?,
            });
        }

        let bytes = page.to_bytes();
        self.data
            .write_at(page_id.byte_offset(self.layout.page_size()), &bytes)?;
        page.set_before_image_bytes(bytes);
        debug!(%page_id, "wrote page");
        Ok(())
    }

    /// Inserts `tuple` into the first page with a free slot.
    ///
    /// Existing pages are tried in order through `cache` in read-write mode.
    /// If all are full, an empty page is appended to the file and handed to
    /// the cache, and the tuple goes into it through a normal checkout. The
    /// modified page is marked dirty by `txn` before its guard is released.
    /// Returns the tuple's new record ID, which is also set on `tuple`. On
    /// error the tuple is stored nowhere and keeps no record ID.
    pub fn insert_tuple<C>(&self, cache: &C, txn: TransactionId, tuple: &mut Tuple) -> Result<RecordId>
    where
        C: PageCache + ?Sized,
    {
        tuple.check_schema(&self.schema)?;

        let table_id = self.table_id();
        let num_pages = self.num_pages()?;
        for page_num in 0..num_pages {
            let page_id = PageId::new(table_id, page_num);
            let mut guard = cache.get_page(txn, page_id, AccessMode::ReadWrite)?;
            if guard.num_empty_slots() == 0 {
                continue;
            }
            let page = guard.page_mut()?;
            match page.insert_tuple(tuple) {
                Ok(record_id) => {
                    page.mark_dirty(true, txn);
                    return Ok(record_id);
                }
                Err(e) if e.is_page_full() => continue,
                Err(e) => return Err(e),
            }
        }

        let page_id = self.append_empty_page(cache, num_pages)?;
        debug!(%page_id, %txn, "allocated heap page");

        let mut guard = cache.get_page(txn, page_id, AccessMode::ReadWrite)?;
        let page = guard.page_mut()?;
        let record_id = page.insert_tuple(tuple)?;
        page.mark_dirty(true, txn);
        Ok(record_id)
    }

    /// Writes an empty page at `page_num` and registers it with `cache`.
    ///
    /// If the cache refuses the page it stays on disk empty, and the next
    /// insert finds it through the normal scan.
    fn append_empty_page<C>(&self, cache: &C, page_num: u32) -> Result<PageId>
    where
        C: PageCache + ?Sized,
    {
        let page_id = PageId::new(self.table_id(), page_num);
        let mut page = HeapPage::new_empty(page_id, Arc::clone(&self.schema), self.layout.page_size())?;
        self.write_page(&mut page)?;
        cache.register_new_page(page_id, page)?;
        Ok(page_id)
    }

    /// Deletes `tuple` from the page its record ID names and marks that page
    /// dirty by `txn`.
    ///
    /// Returns the ID of the modified page.
    pub fn delete_tuple<C>(&self, cache: &C, txn: TransactionId, tuple: &Tuple) -> Result<PageId>
    where
        C: PageCache + ?Sized,
    {
        let record_id = tuple.record_id().ok_or(StrataError::TupleNotPlaced)?;
        if record_id.page_id.table_id != self.table_id() {
            return Err(StrataError::TupleNotOnPage {
                page_id: record_id.page_id,
                reason: format!("page belongs to another table than {}", self.table_id()),
            });
        }

        let mut guard = cache.get_page(txn, record_id.page_id, AccessMode::ReadWrite)?;
        let page = guard.page_mut()?;
        page.delete_tuple(tuple)?;
        page.mark_dirty(true, txn);
        Ok(record_id.page_id)
    }

    /// Returns a scan over every tuple, pages ascending then slots
    /// ascending. The scan must be opened before use.
    pub fn iter<'a, C>(&'a self, cache: &'a C, txn: TransactionId) -> HeapFileIterator<'a, C>
    where
        C: PageCache + ?Sized,
    {
        HeapFileIterator::new(self, cache, txn)
    }
}
