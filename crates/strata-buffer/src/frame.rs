//! Frames: the fixed slots of the buffer pool.

use parking_lot::RwLock;
use std::sync::Arc;
use strata_common::page::PageId;
use strata_storage::{HeapPage, SharedPage};

/// Index of a frame within the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding at most one page.
///
/// The frame keeps one reference to the page; every outstanding
/// [`PageGuard`](strata_storage::PageGuard) holds another. A frame whose
/// page has no other references is unpinned.
pub struct BufferFrame {
    frame_id: FrameId,
    resident: Option<(PageId, SharedPage)>,
}

impl BufferFrame {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            resident: None,
        }
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// ID of the resident page, if any.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        self.resident.as_ref().map(|(page_id, _)| *page_id)
    }

    /// Returns the resident page.
    #[inline]
    pub fn page(&self) -> Option<&SharedPage> {
        self.resident.as_ref().map(|(_, page)| page)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resident.is_none()
    }

    /// Returns true if a guard or other clone of the page is alive.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.page().is_some_and(|page| Arc::strong_count(page) > 1)
    }

    /// Returns true if the resident page is marked dirty.
    ///
    /// A page locked for writing counts as dirty since its state is unknown.
    pub fn is_dirty(&self) -> bool {
        self.page().is_some_and(|page| {
            page.try_read()
                .map_or(true, |page| page.is_dirty().is_some())
        })
    }

    /// Returns true if the frame holds a clean page nobody has checked out.
    pub fn is_evictable(&self) -> bool {
        !self.is_empty() && !self.is_pinned() && !self.is_dirty()
    }

    /// Places a page in this frame and returns the shared handle.
    pub fn install(&mut self, page_id: PageId, page: HeapPage) -> SharedPage {
        let shared = Arc::new(RwLock::new(page));
        self.resident = Some((page_id, Arc::clone(&shared)));
        shared
    }

    /// Empties the frame, returning the page that was resident.
    pub fn reset(&mut self) -> Option<(PageId, SharedPage)> {
        self.resident.take()
    }
}
