//! In-memory page store for tests.

use std::collections::HashMap;

use bytes::Bytes;
use keel_common::types::PageId;
use parking_lot::Mutex;

use super::scheduler::{DiskOp, DiskRequest, DiskScheduler};

/// A [`DiskScheduler`] that keeps pages in a hash map and completes
/// every request inline on the calling thread.
///
/// Pages that were never written read back as all-zero, matching the
/// file-backed store's behavior.
#[derive(Debug)]
pub struct MemoryDiskScheduler {
    pages: Mutex<HashMap<PageId, Bytes>>,
    page_size: usize,
}

impl MemoryDiskScheduler {
    /// Creates an empty in-memory store.
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            page_size,
        }
    }

    /// Number of pages ever written.
    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    /// Returns true if no page has been written yet.
    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }

    /// Returns true if `page_id` has been written to the store.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.lock().contains_key(&page_id)
    }
}

impl DiskScheduler for MemoryDiskScheduler {
    fn schedule(&self, request: DiskRequest) {
        let result = match request.op {
            DiskOp::Read => {
                let pages = self.pages.lock();
                Ok(pages
                    .get(&request.page_id)
                    .cloned()
                    .unwrap_or_else(|| Bytes::from(vec![0u8; self.page_size])))
            }
            DiskOp::Write(data) => {
                self.pages.lock().insert(request.page_id, data);
                Ok(Bytes::new())
            }
        };
        request.completion.fulfill(result);
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
