//! File-backed page store.
//!
//! The disk manager owns a single data file laid out as an array of
//! fixed-size pages: page `i` lives at byte offset `i * page_size`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use keel_common::types::PageId;
use parking_lot::Mutex;
use tracing::warn;

use super::error::{DiskError, DiskResult};

/// Synchronous, page-granular access to a single data file.
///
/// The underlying file is guarded by a mutex, so a `DiskManager` can be
/// shared between a scheduler worker and direct callers (e.g. tests).
pub struct DiskManager {
    /// The data file, wrapped in a mutex for thread-safe positioned I/O.
    file: Mutex<File>,
    /// The file path.
    path: PathBuf,
    /// Size of one page in bytes.
    page_size: usize,
}

impl DiskManager {
    /// Opens (creating if necessary) the data file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
        })
    }

    /// Returns the page size this store was opened with.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the path of the data file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the page `page_id` into `buf`.
    ///
    /// A read past the end of the file yields zeroes for the missing
    /// bytes; pages that were never written read back as all-zero.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < buf.len() {
            warn!(
                page_id = %page_id,
                bytes = filled,
                "short read from page store, zero-filling remainder"
            );
            buf[filled..].fill(0);
        }
        Ok(())
    }

    /// Writes a full page of data under `page_id`.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        if data.len() != self.page_size {
            return Err(DiskError::PayloadSize {
                expected: self.page_size,
                actual: data.len(),
            });
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Forces all written pages down to the storage device.
    pub fn sync(&self) -> DiskResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    #[inline]
    fn offset(&self, page_id: PageId) -> u64 {
        page_id.as_u64() * self.page_size as u64
    }
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 512;

    fn open_manager(dir: &tempfile::TempDir) -> DiskManager {
        DiskManager::open(dir.path().join("pages.db"), PAGE_SIZE).unwrap()
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        let mut page = vec![0u8; PAGE_SIZE];
        page[..5].copy_from_slice(b"hello");
        disk.write_page(PageId::new(3), &page).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(3), &mut buf).unwrap();
        assert_eq!(buf, page);
    }

    #[test]
    fn test_unwritten_page_reads_zero() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        let mut buf = vec![0xffu8; PAGE_SIZE];
        disk.read_page(PageId::new(9), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pages_do_not_overlap() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        disk.write_page(PageId::new(0), &vec![1u8; PAGE_SIZE]).unwrap();
        disk.write_page(PageId::new(1), &vec![2u8; PAGE_SIZE]).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 1));
        disk.read_page(PageId::new(1), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 2));
    }

    #[test]
    fn test_wrong_payload_size() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        let result = disk.write_page(PageId::new(0), &[0u8; 10]);
        assert!(matches!(result, Err(DiskError::PayloadSize { .. })));
    }

    #[test]
    fn test_overwrite_page() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        disk.write_page(PageId::new(2), &vec![7u8; PAGE_SIZE]).unwrap();
        disk.write_page(PageId::new(2), &vec![8u8; PAGE_SIZE]).unwrap();
        disk.sync().unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(2), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 8));
    }
}
