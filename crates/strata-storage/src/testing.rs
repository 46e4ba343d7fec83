//! Minimal page cache for unit tests: loads pages straight from one heap
//! file and keeps them until flushed.

use crate::cache::{AccessMode, PageCache, PageGuard, SharedPage};
use crate::heap::{HeapFile, HeapPage};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use strata_common::page::PageId;
use strata_common::{Result, TransactionId};

pub(crate) struct FileCache<'a> {
    file: &'a HeapFile,
    pages: Mutex<HashMap<PageId, SharedPage>>,
}

impl<'a> FileCache<'a> {
    pub(crate) fn new(file: &'a HeapFile) -> Self {
        Self {
            file,
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Writes every cached page back to the file.
    pub(crate) fn flush(&self) -> Result<()> {
        for page in self.pages.lock().values() {
            self.file.write_page(&mut page.write())?;
        }
        Ok(())
    }

    /// Returns true while a guard for `page_id` is alive.
    pub(crate) fn is_checked_out(&self, page_id: PageId) -> bool {
        self.pages
            .lock()
            .get(&page_id)
            .is_some_and(|page| Arc::strong_count(page) > 1)
    }
}

impl PageCache for FileCache<'_> {
    fn get_page(&self, _txn: TransactionId, page_id: PageId, mode: AccessMode) -> Result<PageGuard> {
        let page = {
            let mut pages = self.pages.lock();
            match pages.get(&page_id) {
                Some(page) => Arc::clone(page),
                None => {
                    let page = Arc::new(RwLock::new(self.file.read_page(page_id)?));
                    pages.insert(page_id, Arc::clone(&page));
                    page
                }
            }
        };
        Ok(PageGuard::acquire(&page, mode))
    }

    fn register_new_page(&self, page_id: PageId, page: HeapPage) -> Result<()> {
        self.pages.lock().insert(page_id, Arc::new(RwLock::new(page)));
        Ok(())
    }
}
