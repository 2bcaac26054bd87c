//! Buffer pool manager for KeelDB.
//!
//! The buffer pool mediates access between a fixed-size in-memory page
//! cache and the larger on-disk page store:
//!
//! - **Pin/Unpin**: reference counting keeps a page resident while any
//!   guard still refers to it
//! - **LRU-K Eviction**: cold pages are selected by backward k-distance
//!   and written back if dirty
//! - **Page Guards**: scoped handles that release latch and pin on drop
//! - **Dirty Tracking**: modified pages are written back before their
//!   frame is reused
//!
//! # Architecture
//!
//! ```text
//!             ┌──────────────────────────────────────┐
//!             │              BufferPool              │
//!             │  page table   HashMap<PageId, Frame> │
//!             │  free list    VecDeque<FrameId>      │
//!             │  next page id u64                    │
//!             └───────┬──────────────────┬───────────┘
//!                     │                  │
//!        ┌────────────▼───────┐  ┌───────▼────────────┐
//!        │   Frame array      │  │   LruKReplacer     │
//!        │ page_id  data[]    │  │  per-frame access  │
//!        │ pin_cnt  dirty     │  │  history, victims  │
//!        └────────────┬───────┘  └────────────────────┘
//!                     │
//!             ┌───────▼───────┐
//!             │ DiskScheduler │
//!             └───────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use keel_storage::buffer::{BufferPool, BufferPoolConfig};
//! use keel_storage::disk::{DiskManager, FileDiskScheduler};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BufferPoolConfig::new(1024);
//!     let manager = DiskManager::open("data.db", config.page_size)?;
//!     let disk = Arc::new(FileDiskScheduler::new(manager));
//!     let pool = Arc::new(BufferPool::new(config, disk)?);
//!
//!     // Allocate a page and write into it
//!     let mut guard = pool.new_page()?.upgrade_write();
//!     guard.data_mut()[..5].copy_from_slice(b"hello");
//!     let page_id = guard.page_id();
//!     drop(guard); // latch released, pin dropped
//!
//!     // Fetch it back for reading
//!     let guard = pool.fetch_page_read(page_id)?;
//!     assert_eq!(&guard.data()[..5], b"hello");
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod frame;
mod latch;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{BufferFrame, FrameId};
pub use latch::{PageGuard, ReadPageGuard, WritePageGuard};
pub use pool::BufferPool;
pub use replacer::{AccessType, LruKReplacer};

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of fetches served from memory.
    pub hits: u64,
    /// Number of fetches that required a disk read.
    pub misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of pages written back to disk.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_hit_ratio() {
        let mut stats = BufferPoolStats::default();
        assert_eq!(stats.hit_ratio(), 0.0);

        stats.fetches = 100;
        stats.hits = 80;
        assert!((stats.hit_ratio() - 0.8).abs() < f64::EPSILON);
    }
}
