//! LRU-K page replacement policy.
//!
//! LRU-K evicts the frame whose *backward k-distance* is largest: the
//! elapsed time, in a global monotonic timestamp space, since the K-th
//! most recent access. A frame with fewer than K recorded accesses has
//! infinite k-distance; within that class, the frame with the earliest
//! recorded access is chosen (classical LRU among under-warmed frames).
//!
//! Compared to plain LRU this resists bursts: a page touched once by a
//! scan has infinite k-distance and goes first, while a page that is
//! genuinely hot keeps a small k-distance no matter how recently a cold
//! page was touched.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// How a page access was made.
///
/// Recorded alongside each access; the default policy does not (yet)
/// treat access types differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Unclassified access.
    #[default]
    Unknown,
    /// Point lookup.
    Get,
    /// Sequential scan.
    Scan,
}

/// Per-frame access history.
#[derive(Debug, Default)]
struct LruKNode {
    /// Up to K most recent access timestamps, oldest at the front.
    history: VecDeque<u64>,
    evictable: bool,
}

#[derive(Debug)]
struct ReplacerState {
    node_store: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    /// Number of evictable nodes.
    curr_size: usize,
}

/// Tracks access history for up to `replacer_size` frames and selects
/// eviction victims by backward k-distance.
///
/// The replacer has its own lock and does no blocking work, so it is
/// safe to call while holding the buffer pool's structural lock.
#[derive(Debug)]
pub struct LruKReplacer {
    state: Mutex<ReplacerState>,
    k: usize,
    replacer_size: usize,
}

impl LruKReplacer {
    /// Creates a replacer tracking frames `0..replacer_size` with
    /// history depth `k`.
    pub fn new(replacer_size: usize, k: usize) -> Self {
        assert!(k >= 1, "replacer k must be at least 1");
        Self {
            state: Mutex::new(ReplacerState {
                node_store: HashMap::new(),
                current_timestamp: 0,
                curr_size: 0,
            }),
            k,
            replacer_size,
        }
    }

    /// Records an access to `frame_id` at the next timestamp, creating
    /// the frame's history node if this is its first access.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside `0..replacer_size`; that is a
    /// caller bug, not a recoverable condition.
    pub fn record_access(&self, frame_id: FrameId, _access: AccessType) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        state.current_timestamp += 1;
        let timestamp = state.current_timestamp;

        let node = state.node_store.entry(frame_id).or_default();
        node.history.push_back(timestamp);
        if node.history.len() > self.k {
            node.history.pop_front();
        }
    }

    /// Toggles whether `frame_id` may be chosen as an eviction victim.
    ///
    /// No-op for untracked frames and for transitions to the current
    /// state. Panics on an out-of-range frame id.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        let Some(node) = state.node_store.get_mut(&frame_id) else {
            return;
        };
        if node.evictable == evictable {
            return;
        }
        node.evictable = evictable;
        if evictable {
            state.curr_size += 1;
        } else {
            state.curr_size -= 1;
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance,
    /// erasing its access history.
    ///
    /// Frames with fewer than K accesses count as infinitely distant;
    /// ties are broken by the earliest recorded access. Returns `None`
    /// when nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let mut victim: Option<FrameId> = None;
        let mut max_distance: u64 = 0;
        let mut oldest_front: u64 = u64::MAX;

        for (&frame_id, node) in &state.node_store {
            if !node.evictable {
                continue;
            }
            // History is never empty: a node only exists after at least
            // one recorded access.
            let front = *node.history.front().expect("tracked frame has history");
            let distance = if node.history.len() >= self.k {
                state.current_timestamp - front
            } else {
                u64::MAX
            };
            if distance > max_distance || (distance == max_distance && front < oldest_front) {
                max_distance = distance;
                oldest_front = front;
                victim = Some(frame_id);
            }
        }

        let frame_id = victim?;
        state.node_store.remove(&frame_id);
        state.curr_size -= 1;
        Some(frame_id)
    }

    /// Forgets `frame_id` entirely, regardless of its k-distance.
    ///
    /// No-op for untracked frames.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable - the caller has
    /// violated the pin/evict contract - or if the id is out of range.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        let Some(node) = state.node_store.get(&frame_id) else {
            return;
        };
        assert!(
            node.evictable,
            "attempt to remove non-evictable frame {:?}",
            frame_id
        );
        state.node_store.remove(&frame_id);
        state.curr_size -= 1;
    }

    /// Number of frames currently evictable.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    #[inline]
    fn check_frame(&self, frame_id: FrameId) {
        assert!(
            frame_id.index() < self.replacer_size,
            "frame id {:?} out of range for replacer of size {}",
            frame_id,
            self.replacer_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    fn record(replacer: &LruKReplacer, id: usize) {
        replacer.record_access(fid(id), AccessType::Unknown);
    }

    #[test]
    fn test_evict_order_mixes_k_distance_and_lru() {
        let replacer = LruKReplacer::new(7, 2);

        // Six frames accessed once each; frame 6 stays pinned.
        for id in 1..=6 {
            record(&replacer, id);
        }
        for id in 1..=5 {
            replacer.set_evictable(fid(id), true);
        }
        replacer.set_evictable(fid(6), false);
        assert_eq!(replacer.size(), 5);

        // Frame 1 gets a second access: finite k-distance, so every
        // once-accessed frame goes first, in LRU order.
        record(&replacer, 1);

        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.size(), 2);

        // Bring in 3 and 4 again and touch 5 and 4.
        record(&replacer, 3);
        record(&replacer, 4);
        record(&replacer, 5);
        record(&replacer, 4);
        replacer.set_evictable(fid(3), true);
        replacer.set_evictable(fid(4), true);
        assert_eq!(replacer.size(), 4);

        // 3 has one access in its new life: infinite distance.
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.size(), 3);

        // 6 still has a single access from the start: oldest infinite.
        replacer.set_evictable(fid(6), true);
        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.evict(), Some(fid(6)));

        // Among {1, 4, 5} all have two accesses; 5's second-most-recent
        // access is oldest once 1 is pinned.
        replacer.set_evictable(fid(1), false);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(fid(5)));

        record(&replacer, 1);
        record(&replacer, 1);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.size(), 0);

        // Nothing left to evict; removing an untracked frame is a no-op.
        assert_eq!(replacer.evict(), None);
        replacer.remove(fid(1));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_under_k_frames_evicted_first() {
        let replacer = LruKReplacer::new(3, 2);

        // Touch 0, 1, 2 once each, then 0 and 1 again. Frame 2 is the
        // only one with infinite k-distance.
        for id in 0..3 {
            record(&replacer, id);
        }
        record(&replacer, 0);
        record(&replacer, 1);
        for id in 0..3 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(2)));
    }

    #[test]
    fn test_k1_degenerates_to_lru() {
        let replacer = LruKReplacer::new(4, 1);

        record(&replacer, 0);
        record(&replacer, 1);
        record(&replacer, 2);
        record(&replacer, 0); // 0 becomes most recent
        for id in 0..3 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_set_evictable_tracks_size() {
        let replacer = LruKReplacer::new(4, 2);

        record(&replacer, 0);
        record(&replacer, 1);
        assert_eq!(replacer.size(), 0);

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);

        // Repeated transitions to the same state do not drift the size.
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 2);

        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.size(), 1);

        // Untracked frame: no-op.
        replacer.set_evictable(fid(3), true);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_evict_skips_pinned() {
        let replacer = LruKReplacer::new(2, 1);

        record(&replacer, 0);
        record(&replacer, 1);
        replacer.set_evictable(fid(1), true);

        // Frame 0 was accessed first but is not evictable.
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove_erases_history() {
        let replacer = LruKReplacer::new(2, 2);

        record(&replacer, 0);
        record(&replacer, 0);
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.remove(fid(0));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        // A fresh access starts a new history.
        record(&replacer, 0);
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_record_access_out_of_range() {
        let replacer = LruKReplacer::new(4, 2);
        // Frame ids are strictly below the replacer size.
        record(&replacer, 4);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_pinned_frame_panics() {
        let replacer = LruKReplacer::new(4, 2);
        record(&replacer, 0);
        replacer.remove(fid(0));
    }
}
