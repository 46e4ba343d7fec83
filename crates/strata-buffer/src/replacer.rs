//! Victim selection for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;

/// Chooses which frame gives up its page when the pool runs out of free
/// frames.
///
/// Eligibility (clean, unpinned) is owned by the pool and passed to
/// [`Replacer::evict`] as a predicate, so a replacer only tracks recency.
pub trait Replacer: Send + Sync {
    /// Notes a hit on or load into `frame_id`.
    fn record_access(&self, frame_id: FrameId);

    /// Picks a frame for which `can_evict` holds, or None if there is none.
    fn evict<F>(&self, can_evict: F) -> Option<FrameId>
    where
        F: FnMut(FrameId) -> bool;

    /// Drops any recency recorded for `frame_id`.
    fn remove(&self, frame_id: FrameId);
}

/// Second-chance clock over a fixed set of frames.
///
/// Each frame has a referenced flag set on access. The hand skips frames the
/// predicate rejects, clears the flag of referenced candidates, and stops at
/// the first unreferenced candidate. Two revolutions are enough to find a
/// victim whenever one exists.
pub struct ClockReplacer {
    state: Mutex<ClockState>,
}

struct ClockState {
    referenced: Vec<bool>,
    hand: usize,
}

impl ClockReplacer {
    pub fn new(num_frames: usize) -> Self {
        Self {
            state: Mutex::new(ClockState {
                referenced: vec![false; num_frames],
                hand: 0,
            }),
        }
    }

    /// Number of frames the clock covers.
    pub fn capacity(&self) -> usize {
        self.state.lock().referenced.len()
    }
}

impl Replacer for ClockReplacer {
    fn record_access(&self, frame_id: FrameId) {
        if let Some(flag) = self.state.lock().referenced.get_mut(frame_id.index()) {
            *flag = true;
        }
    }

    fn evict<F>(&self, mut can_evict: F) -> Option<FrameId>
    where
        F: FnMut(FrameId) -> bool,
    {
        let mut state = self.state.lock();
        let len = state.referenced.len();

        for _ in 0..len * 2 {
            let idx = state.hand;
            state.hand = (idx + 1) % len;

            let candidate = FrameId(idx as u32);
            if !can_evict(candidate) {
                continue;
            }
            if std::mem::replace(&mut state.referenced[idx], false) {
                continue;
            }
            return Some(candidate);
        }

        None
    }

    fn remove(&self, frame_id: FrameId) {
        if let Some(flag) = self.state.lock().referenced.get_mut(frame_id.index()) {
            *flag = false;
        }
    }
}
