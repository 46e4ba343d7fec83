//! Page cache contract consumed by heap files.
//!
//! The cache owns every loaded page and hands out checkouts. A heap file
//! never locks a page itself; it asks the cache for a guard in the mode it
//! needs and releases the page by dropping the guard.

use crate::heap::HeapPage;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use strata_common::page::PageId;
use strata_common::{Result, StrataError, TransactionId};

/// A cached page shared between the cache and its outstanding guards.
pub type SharedPage = Arc<RwLock<HeapPage>>;

/// Access requested for a page checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Shared access; any number of readers at once.
    ReadOnly,
    /// Exclusive access for mutation.
    ReadWrite,
}

/// A checked-out page.
///
/// Shared guards only deref to `&HeapPage`. Exclusive guards also hand out
/// `&mut HeapPage` through [`PageGuard::page_mut`]. The checkout ends when
/// the guard is dropped.
pub enum PageGuard {
    Shared(ArcRwLockReadGuard<RawRwLock, HeapPage>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, HeapPage>),
}

impl PageGuard {
    /// Locks `page` in the requested mode, blocking until it is available.
    pub fn acquire(page: &SharedPage, mode: AccessMode) -> Self {
        match mode {
            AccessMode::ReadOnly => PageGuard::Shared(page.read_arc()),
            AccessMode::ReadWrite => PageGuard::Exclusive(page.write_arc()),
        }
    }

    /// Like [`PageGuard::acquire`], but gives up after `timeout`.
    pub fn try_acquire_for(page: &SharedPage, mode: AccessMode, timeout: Duration) -> Option<Self> {
        match mode {
            AccessMode::ReadOnly => page.try_read_arc_for(timeout).map(PageGuard::Shared),
            AccessMode::ReadWrite => page.try_write_arc_for(timeout).map(PageGuard::Exclusive),
        }
    }

    /// Returns the mode this guard was acquired in.
    pub fn mode(&self) -> AccessMode {
        match self {
            PageGuard::Shared(_) => AccessMode::ReadOnly,
            PageGuard::Exclusive(_) => AccessMode::ReadWrite,
        }
    }

    /// Returns mutable access to the page.
    ///
    /// Fails with `PermissionDenied` if the page was checked out read-only.
    pub fn page_mut(&mut self) -> Result<&mut HeapPage> {
        match self {
            PageGuard::Exclusive(guard) => Ok(&mut **guard),
            PageGuard::Shared(guard) => Err(StrataError::PermissionDenied(format!(
                "page {} checked out read-only",
                guard.page_id()
            ))),
        }
    }
}

impl Deref for PageGuard {
    type Target = HeapPage;

    fn deref(&self) -> &HeapPage {
        match self {
            PageGuard::Shared(guard) => &**guard,
            PageGuard::Exclusive(guard) => &**guard,
        }
    }
}

impl std::fmt::Debug for PageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id())
            .field("mode", &self.mode())
            .finish()
    }
}

/// The page cache a heap file routes its page accesses through.
pub trait PageCache {
    /// Checks out a page, loading it if the cache does not hold it.
    ///
    /// May block while another checkout conflicts, and may fail with
    /// `TransactionAborted` if the cache decides the caller must give up.
    fn get_page(&self, txn: TransactionId, page_id: PageId, mode: AccessMode)
        -> Result<PageGuard>;

    /// Hands a freshly allocated page to the cache.
    fn register_new_page(&self, page_id: PageId, page: HeapPage) -> Result<()>;
}
