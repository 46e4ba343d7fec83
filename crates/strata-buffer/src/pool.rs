//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::replacer::{ClockReplacer, Replacer};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_common::page::PageId;
use strata_common::{Result, StorageConfig, StrataError, TransactionId};
use strata_storage::{
    AccessMode, HeapFile, HeapPage, PageCache, PageGuard, RecordId, SharedPage, Tuple,
};
use tracing::{debug, trace};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
    /// How long a checkout or flush waits for a page lock before the
    /// caller's transaction is aborted.
    pub lock_timeout: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_frames: 50,
            lock_timeout: Duration::from_millis(1000),
        }
    }
}

impl From<&StorageConfig> for BufferPoolConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            num_frames: config.buffer_pool_pages,
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }
}

/// Point-in-time counters for the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub num_frames: usize,
    pub resident_pages: usize,
    pub dirty_pages: usize,
    pub pinned_pages: usize,
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with:
/// - Page ID to frame ID mapping
/// - Free frame list for new pages
/// - Clock replacement over clean, unpinned frames
/// - A registry of open heap files used to load pages on a miss
///
/// Dirty pages are never evicted. They stay resident until flushed or
/// discarded, so a pool whose frames are all dirty or checked out fails
/// further loads with `BufferPoolFull`.
///
/// Page locks are waited on for at most `lock_timeout`. A checkout or
/// flush that cannot get its lock in time fails with `TransactionAborted`,
/// which also covers a thread asking for write access to a page it is still
/// reading.
pub struct BufferPool {
    config: BufferPoolConfig,
    state: Mutex<PoolState>,
    replacer: ClockReplacer,
    tables: RwLock<HashMap<u32, Arc<HeapFile>>>,
}

struct PoolState {
    frames: Vec<BufferFrame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
}

impl BufferPool {
    /// Creates a new buffer pool.
    pub fn new(config: BufferPoolConfig) -> Self {
        let num_frames = config.num_frames;

        let frames = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // Popped from the back, so frame 0 is handed out first.
        let free_list = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        Self {
            config,
            state: Mutex::new(PoolState {
                frames,
                page_table: HashMap::with_capacity(num_frames),
                free_list,
            }),
            replacer: ClockReplacer::new(num_frames),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a buffer pool sized from a storage configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(BufferPoolConfig::from(config)))
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns the number of pages currently in the pool.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Checks if a page is in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the transaction that dirtied a resident page.
    ///
    /// Returns None if the page is clean or not resident.
    pub fn dirtied_by(&self, page_id: PageId) -> Option<TransactionId> {
        let page = self.resident(page_id)?;
        let dirtied_by = page.read().is_dirty();
        dirtied_by
    }

    /// Returns current counters.
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.state.lock();
        let mut stats = BufferPoolStats {
            num_frames: self.config.num_frames,
            resident_pages: state.page_table.len(),
            dirty_pages: 0,
            pinned_pages: 0,
        };
        for frame in state.frames.iter().filter(|f| !f.is_empty()) {
            stats.dirty_pages += frame.is_dirty() as usize;
            stats.pinned_pages += frame.is_pinned() as usize;
        }
        stats
    }

    // =========================================================================
    // Table registry
    // =========================================================================

    /// Registers a heap file so its pages can be loaded on a miss.
    ///
    /// Returns the file's table ID. Registering a file with the same table
    /// ID replaces the earlier one.
    pub fn register_table(&self, file: Arc<HeapFile>) -> u32 {
        let table_id = file.table_id();
        debug!(table_id, path = %file.path().display(), "registered table");
        self.tables.write().insert(table_id, file);
        table_id
    }

    /// Returns the heap file registered under `table_id`.
    pub fn table(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(StrataError::TableNotFound(table_id))
    }

    // =========================================================================
    // Tuple operations
    // =========================================================================

    /// Inserts `tuple` into the table. The modified page is left dirty by
    /// `txn`.
    pub fn insert_tuple(&self, txn: TransactionId, table_id: u32, tuple: &mut Tuple) -> Result<RecordId> {
        self.table(table_id)?.insert_tuple(self, txn, tuple)
    }

    /// Deletes `tuple` from the table its record ID names. The modified
    /// page is left dirty by `txn`.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StrataError::TupleNotPlaced)?;
        let file = self.table(record_id.page_id.table_id)?;
        file.delete_tuple(self, txn, tuple)?;
        Ok(())
    }

    // =========================================================================
    // Write-back
    // =========================================================================

    /// Writes a page back to its file if it is dirty.
    ///
    /// Returns true if the page was written.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        match self.resident(page_id) {
            Some(page) => self.write_back(page_id, &page, None),
            None => Ok(false),
        }
    }

    /// Writes back every dirty page.
    ///
    /// Returns the number of pages written.
    pub fn flush_all_pages(&self) -> Result<usize> {
        let mut flushed = 0;
        for (page_id, page) in self.resident_pages() {
            flushed += self.write_back(page_id, &page, None)? as usize;
        }
        debug!(flushed, "flushed all pages");
        Ok(flushed)
    }

    /// Writes back the pages dirtied by `txn`.
    ///
    /// Returns the number of pages written.
    pub fn flush_pages(&self, txn: TransactionId) -> Result<usize> {
        let mut flushed = 0;
        for (page_id, page) in self.resident_pages() {
            flushed += self.write_back(page_id, &page, Some(txn))? as usize;
        }
        debug!(%txn, flushed, "flushed transaction pages");
        Ok(flushed)
    }

    /// Drops a page from the pool without writing it back.
    ///
    /// Outstanding guards keep their copy alive, but it is no longer
    /// reachable through the pool. Returns true if the page was resident.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(frame_id) = state.page_table.remove(&page_id) else {
            return false;
        };

        state.frames[frame_id.index()].reset();
        state.free_list.push(frame_id);
        self.replacer.remove(frame_id);
        debug!(%page_id, %frame_id, "discarded page");
        true
    }

    fn write_back(&self, page_id: PageId, page: &SharedPage, only: Option<TransactionId>) -> Result<bool> {
        let Some(mut page) = page.try_write_for(self.config.lock_timeout) else {
            return Err(lock_timeout(page_id, AccessMode::ReadWrite));
        };
        let Some(txn) = page.is_dirty() else {
            return Ok(false);
        };
        if only.is_some_and(|only| only != txn) {
            return Ok(false);
        }

        let file = self.table(page_id.table_id)?;
        file.write_page(&mut page)?;
        page.mark_dirty(false, txn);
        debug!(%page_id, %txn, "flushed page");
        Ok(true)
    }

    // =========================================================================
    // Frame management
    // =========================================================================

    fn resident(&self, page_id: PageId) -> Option<SharedPage> {
        let state = self.state.lock();
        let frame_id = state.page_table.get(&page_id)?;
        state.frames[frame_id.index()].page().cloned()
    }

    fn resident_pages(&self) -> Vec<(PageId, SharedPage)> {
        let state = self.state.lock();
        let mut pages: Vec<_> = state
            .frames
            .iter()
            .filter_map(|frame| Some((frame.page_id()?, Arc::clone(frame.page()?))))
            .collect();
        pages.sort_by_key(|(page_id, _)| *page_id);
        pages
    }

    fn checkout(&self, page_id: PageId, page: &SharedPage, mode: AccessMode) -> Result<PageGuard> {
        PageGuard::try_acquire_for(page, mode, self.config.lock_timeout)
            .ok_or_else(|| lock_timeout(page_id, mode))
    }

    /// Allocates a frame, evicting a clean unpinned page if none is free.
    fn allocate_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frames = &state.frames;
        let victim = self
            .replacer
            .evict(|fid| frames[fid.index()].is_evictable())
            .ok_or(StrataError::BufferPoolFull)?;

        if let Some((old_page_id, _)) = state.frames[victim.index()].reset() {
            state.page_table.remove(&old_page_id);
            debug!(page_id = %old_page_id, frame_id = %victim, "evicted page");
        }
        Ok(victim)
    }

    /// Makes `page` resident under `page_id` unless another thread got
    /// there first, and returns the resident copy.
    fn install(&self, page_id: PageId, page: HeapPage) -> Result<SharedPage> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.replacer.record_access(frame_id);
            if let Some(existing) = state.frames[frame_id.index()].page() {
                return Ok(Arc::clone(existing));
            }
        }

        let frame_id = self.allocate_frame(&mut state)?;
        let shared = state.frames[frame_id.index()].install(page_id, page);
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        Ok(shared)
    }
}

fn lock_timeout(page_id: PageId, mode: AccessMode) -> StrataError {
    debug!(%page_id, ?mode, "page lock timed out");
    StrataError::TransactionAborted(format!(
        "timed out waiting for {:?} access to page {}",
        mode, page_id
    ))
}

impl PageCache for BufferPool {
    fn get_page(&self, _txn: TransactionId, page_id: PageId, mode: AccessMode) -> Result<PageGuard> {
        let hit = {
            let state = self.state.lock();
            state.page_table.get(&page_id).and_then(|&frame_id| {
                self.replacer.record_access(frame_id);
                state.frames[frame_id.index()].page().cloned()
            })
        };
        if let Some(page) = hit {
            trace!(%page_id, "buffer pool hit");
            return self.checkout(page_id, &page, mode);
        }

        // Read outside the pool lock; install re-checks for a racing load.
        let file = self.table(page_id.table_id)?;
        let page = file.read_page(page_id)?;
        let page = self.install(page_id, page)?;
        trace!(%page_id, "buffer pool miss");
        self.checkout(page_id, &page, mode)
    }

    fn register_new_page(&self, page_id: PageId, page: HeapPage) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &mut state.frames[frame_id.index()];
            if frame.is_pinned() {
                return Err(StrataError::Internal(format!(
                    "page {} registered while checked out",
                    page_id
                )));
            }
            frame.install(page_id, page);
            return Ok(());
        }

        let frame_id = self.allocate_frame(&mut state)?;
        state.frames[frame_id.index()].install(page_id, page);
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        Ok(())
    }
}
