//! Buffer pool implementation.
//!
//! The buffer pool mediates between a fixed set of in-memory page
//! frames and the on-disk page store, handing out pinned page guards
//! and evicting cold pages through the LRU-K replacer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use keel_common::types::PageId;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{BufferFrame, FrameId};
use super::latch::{PageGuard, ReadPageGuard, WritePageGuard};
use super::replacer::{AccessType, LruKReplacer};
use super::BufferPoolStats;
use crate::disk::DiskScheduler;

/// Structural bookkeeping, guarded by one mutex.
///
/// Every frame id is either on the free list or referenced by exactly
/// one page-table entry, never both.
struct PoolState {
    /// Maps resident page ids to the frames hosting them.
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no resident page.
    free_list: VecDeque<FrameId>,
    /// Monotonic page id allocator. Ids are never reused.
    next_page_id: u64,
}

/// The buffer pool manager.
///
/// All mutating operations serialize on the structural mutex; disk I/O
/// issued on behalf of an operation completes while that mutex is held,
/// so concurrent fetches of the same page id cannot admit it twice.
/// Page latches are never acquired under the structural mutex - guards
/// latch after their pin is taken and the mutex is released.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// The frame array. Indices are frame ids; the array never moves
    /// or resizes for the pool's lifetime.
    frames: Vec<Arc<BufferFrame>>,
    /// Page table, free list, and page id allocator.
    state: Mutex<PoolState>,
    /// LRU-K eviction policy. Has its own lock and never blocks.
    replacer: LruKReplacer,
    /// The page store.
    disk: Arc<dyn DiskScheduler>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a buffer pool over the given page store.
    ///
    /// All frames start on the free list and the page table is empty.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn DiskScheduler>) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        if disk.page_size() != config.page_size {
            return Err(BufferError::config(
                "disk scheduler page size does not match pool page size",
            ));
        }

        let frames: Vec<Arc<BufferFrame>> = (0..config.pool_size)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i), config.page_size)))
            .collect();

        let state = PoolState {
            page_table: HashMap::with_capacity(config.pool_size),
            free_list: (0..config.pool_size).map(FrameId::new).collect(),
            next_page_id: 0,
        };

        Ok(Self {
            replacer: LruKReplacer::new(config.pool_size, config.replacer_k),
            frames,
            state: Mutex::new(state),
            disk,
            config,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Allocates a fresh page id and pins it into a frame.
    ///
    /// The frame comes from the free list, or from evicting a victim
    /// (whose contents are written back first if dirty). Fails with
    /// [`BufferError::NoFreeFrames`] when every resident page is pinned.
    pub fn new_page(self: &Arc<Self>) -> BufferResult<PageGuard> {
        let mut state = self.state.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.index()];
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, AccessType::Unknown);
        self.replacer.set_evictable(frame_id, false);

        trace!(page_id = %page_id, frame_id = frame_id.index(), "allocated new page");
        Ok(PageGuard::new(Arc::clone(self), Arc::clone(frame)))
    }

    /// Pins the page `page_id` into the pool, reading it from disk if
    /// it is not resident.
    ///
    /// Fails with [`BufferError::NoFreeFrames`] when the page is not
    /// resident and no frame can be freed, or with
    /// [`BufferError::Disk`] if the read fails.
    pub fn fetch_page(
        self: &Arc<Self>,
        page_id: PageId,
        access: AccessType,
    ) -> BufferResult<PageGuard> {
        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            if frame.pin_count() == 0 {
                self.replacer.set_evictable(frame_id, false);
            }
            frame.pin();
            self.replacer.record_access(frame_id, access);
            trace!(page_id = %page_id, frame_id = frame_id.index(), "buffer pool hit");
            return Ok(PageGuard::new(Arc::clone(self), Arc::clone(frame)));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];
        frame.reset();

        match self.disk.read_page(page_id).wait() {
            Ok(data) => frame.copy_from(&data),
            Err(err) => {
                // Hand the frame back rather than leaking it.
                state.free_list.push_back(frame_id);
                return Err(err.into());
            }
        }

        frame.set_page_id(page_id);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, access);
        self.replacer.set_evictable(frame_id, false);

        trace!(page_id = %page_id, frame_id = frame_id.index(), "buffer pool miss, read from disk");
        Ok(PageGuard::new(Arc::clone(self), Arc::clone(frame)))
    }

    /// Fetches `page_id` and takes the shared latch before returning.
    ///
    /// The pin is taken under the pool mutex; the latch is acquired
    /// after it is released, so a fetch never waits on a latch while
    /// blocking the rest of the pool.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> BufferResult<ReadPageGuard> {
        Ok(self.fetch_page(page_id, AccessType::Unknown)?.upgrade_read())
    }

    /// Fetches `page_id` and takes the exclusive latch before returning.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> BufferResult<WritePageGuard> {
        Ok(self
            .fetch_page(page_id, AccessType::Unknown)?
            .upgrade_write())
    }

    /// Drops one pin on `page_id`, folding `is_dirty` into the frame's
    /// dirty flag.
    ///
    /// Returns false if the page is not resident or was already
    /// unpinned; both are tolerated since independent subsystems may
    /// race on unpin. When the last pin drops the frame becomes
    /// evictable.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes `page_id` back to disk, regardless of its pin state, and
    /// clears its dirty flag.
    ///
    /// Returns `Ok(false)` if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        self.write_back(&self.frames[frame_id.index()], page_id)?;
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Writes every resident page back to disk, returning how many
    /// pages were written.
    pub fn flush_all_pages(&self) -> BufferResult<usize> {
        // One pass under one lock acquisition; re-entering flush_page
        // per id would self-deadlock on the non-reentrant pool mutex.
        let state = self.state.lock();

        let mut flushed = 0;
        for (&page_id, &frame_id) in state.page_table.iter() {
            self.write_back(&self.frames[frame_id.index()], page_id)?;
            flushed += 1;
        }
        self.flush_count.fetch_add(flushed as u64, Ordering::Relaxed);
        Ok(flushed)
    }

    /// Evicts `page_id` from the pool without writing it back,
    /// returning its frame to the free list.
    ///
    /// Returns true if the page is not resident (vacuously deleted),
    /// false if it is pinned. The in-memory contents are discarded; the
    /// page id is not reclaimed for future allocation.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return true,
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() > 0 {
            return false;
        }

        self.replacer.remove(frame_id);
        state.page_table.remove(&page_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        debug!(page_id = %page_id, frame_id = frame_id.index(), "deleted page");
        true
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    /// Returns the number of frames in the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns true if `page_id` is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Produces a frame to host a new resident page: free list first,
    /// then eviction. An evicted victim is unmapped and, if dirty,
    /// written back under its old page id.
    fn acquire_frame(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Err(BufferError::NoFreeFrames),
        };
        let frame = &self.frames[frame_id.index()];
        let old_page_id = frame.page_id();
        state.page_table.remove(&old_page_id);

        if frame.is_dirty() {
            if let Err(err) = self.write_back(frame, old_page_id) {
                // Restore the mapping and the replacer node so the
                // dirty page is not silently lost.
                state.page_table.insert(old_page_id, frame_id);
                self.replacer.record_access(frame_id, AccessType::Unknown);
                self.replacer.set_evictable(frame_id, true);
                return Err(err);
            }
        }

        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            page_id = %old_page_id,
            frame_id = frame_id.index(),
            "evicted page"
        );
        Ok(frame_id)
    }

    /// Writes a frame's contents to disk under `page_id` and clears the
    /// dirty flag. Blocks on the scheduler's completion.
    fn write_back(&self, frame: &BufferFrame, page_id: PageId) -> BufferResult<()> {
        // Recursive read: a caller flushing a page it already holds the
        // shared latch on must not deadlock behind a queued writer.
        let data = Bytes::copy_from_slice(&frame.latch().read_recursive());
        self.disk.write_page(page_id, data).wait()?;
        frame.set_dirty(false);
        Ok(())
    }

    /// Test hook: the frame currently hosting `page_id`.
    #[cfg(test)]
    pub(crate) fn resident_frame(&self, page_id: PageId) -> Option<Arc<BufferFrame>> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|frame_id| Arc::clone(&self.frames[frame_id.index()]))
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("pool_size", &self.config.pool_size)
            .field("page_size", &self.config.page_size)
            .field("resident_pages", &self.state.lock().page_table.len())
            .finish()
    }
}
