//! Scoped page guards.
//!
//! A guard represents an outstanding pin on a buffer frame and,
//! for the read/write variants, a held page latch. Dropping a guard
//! releases the latch (if any) and then unpins through the pool, so a
//! caller cannot leak a pin or a latch by early return or panic.
//!
//! Guards are move-only: moving one transfers the pin (and latch) and
//! leaves nothing behind to double-release.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use keel_common::types::{Lsn, PageId};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use super::frame::BufferFrame;
use super::pool::BufferPool;

type SharedLatch = ArcRwLockReadGuard<RawRwLock, Vec<u8>>;
type ExclusiveLatch = ArcRwLockWriteGuard<RawRwLock, Vec<u8>>;

/// A pinned page without a held latch.
///
/// The guard is *engaged* while it still owns the pin; [`release`]
/// disengages it. Data accessors take the page latch only for the
/// duration of the borrow; use [`upgrade_read`] / [`upgrade_write`] to
/// hold a latch across accesses.
///
/// [`release`]: PageGuard::release
/// [`upgrade_read`]: PageGuard::upgrade_read
/// [`upgrade_write`]: PageGuard::upgrade_write
pub struct PageGuard {
    pool: Arc<BufferPool>,
    frame: Option<Arc<BufferFrame>>,
    /// Dirty hint, consumed by the unpin on release.
    dirty: bool,
}

impl PageGuard {
    pub(crate) fn new(pool: Arc<BufferPool>, frame: Arc<BufferFrame>) -> Self {
        Self {
            pool,
            frame: Some(frame),
            dirty: false,
        }
    }

    /// Returns the guarded page's id, or [`PageId::INVALID`] if the
    /// guard has been released.
    pub fn page_id(&self) -> PageId {
        self.frame
            .as_ref()
            .map_or(PageId::INVALID, |frame| frame.page_id())
    }

    /// Returns true while the guard still owns its pin.
    pub fn is_engaged(&self) -> bool {
        self.frame.is_some()
    }

    /// Shared view of the page data. Takes the page latch for the
    /// duration of the borrow.
    ///
    /// # Panics
    ///
    /// Panics if the guard has been released.
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        let frame = self.frame.as_ref().expect("page guard released");
        FrameDataRef {
            guard: frame.read_data(),
        }
    }

    /// Mutable view of the page data. Takes the exclusive page latch
    /// for the duration of the borrow and records the dirty hint.
    ///
    /// # Panics
    ///
    /// Panics if the guard has been released.
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.dirty = true;
        let frame = self.frame.as_ref().expect("page guard released");
        FrameDataMut {
            guard: frame.write_data(),
        }
    }

    /// Records the dirty hint without touching the data.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Releases the pin now. Idempotent: the eventual drop of a
    /// released guard does nothing.
    pub fn release(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.pool.unpin_page(frame.page_id(), self.dirty);
        }
    }

    /// Acquires the shared latch and converts this guard into a
    /// [`ReadPageGuard`], transferring the pin.
    ///
    /// Upgrading a released guard yields a released read guard.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let frame = self.frame.take();
        let latch = frame.as_ref().map(|frame| frame.latch().read_arc());
        ReadPageGuard {
            latch,
            inner: PageGuard {
                pool: Arc::clone(&self.pool),
                frame,
                dirty: self.dirty,
            },
        }
    }

    /// Acquires the exclusive latch and converts this guard into a
    /// [`WritePageGuard`], transferring the pin.
    ///
    /// Upgrading a released guard yields a released write guard.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let frame = self.frame.take();
        let latch = frame.as_ref().map(|frame| frame.latch().write_arc());
        WritePageGuard {
            latch,
            inner: PageGuard {
                pool: Arc::clone(&self.pool),
                frame,
                dirty: self.dirty,
            },
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id())
            .field("engaged", &self.is_engaged())
            .field("dirty", &self.dirty)
            .finish()
    }
}

struct FrameDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for FrameDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

struct FrameDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for FrameDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for FrameDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// A pinned page holding the shared latch.
///
/// Destruction releases the latch first, then the pin. Fields are
/// declared in that order; do not reorder them.
pub struct ReadPageGuard {
    latch: Option<SharedLatch>,
    inner: PageGuard,
}

impl ReadPageGuard {
    /// Returns the guarded page's id, or [`PageId::INVALID`] if
    /// released.
    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    /// Returns true while the guard still owns its pin and latch.
    pub fn is_engaged(&self) -> bool {
        self.inner.is_engaged()
    }

    /// The page data.
    ///
    /// # Panics
    ///
    /// Panics if the guard has been released.
    pub fn data(&self) -> &[u8] {
        self.latch.as_ref().expect("read guard released")
    }

    /// Releases latch and pin now. Idempotent.
    pub fn release(&mut self) {
        self.latch.take();
        self.inner.release();
    }
}

impl std::fmt::Debug for ReadPageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.page_id())
            .field("engaged", &self.is_engaged())
            .finish()
    }
}

/// A pinned page holding the exclusive latch.
///
/// Destruction releases the latch first, then the pin. Fields are
/// declared in that order; do not reorder them.
pub struct WritePageGuard {
    latch: Option<ExclusiveLatch>,
    inner: PageGuard,
}

impl WritePageGuard {
    /// Returns the guarded page's id, or [`PageId::INVALID`] if
    /// released.
    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    /// Returns true while the guard still owns its pin and latch.
    pub fn is_engaged(&self) -> bool {
        self.inner.is_engaged()
    }

    /// The page data.
    ///
    /// # Panics
    ///
    /// Panics if the guard has been released.
    pub fn data(&self) -> &[u8] {
        self.latch.as_ref().expect("write guard released")
    }

    /// Mutable page data. Records the dirty hint.
    ///
    /// # Panics
    ///
    /// Panics if the guard has been released.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.inner.mark_dirty();
        self.latch.as_mut().expect("write guard released")
    }

    /// Stamps the frame with the LSN of the modification, for log
    /// manager integration.
    ///
    /// # Panics
    ///
    /// Panics if the guard has been released.
    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.inner
            .frame
            .as_ref()
            .expect("write guard released")
            .set_lsn(lsn);
    }

    /// Releases latch and pin now. Idempotent.
    pub fn release(&mut self) {
        self.latch.take();
        self.inner.release();
    }
}

impl std::fmt::Debug for WritePageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("page_id", &self.page_id())
            .field("engaged", &self.is_engaged())
            .finish()
    }
}
