//! Disk request scheduling.
//!
//! The buffer pool does not talk to a page store directly; it submits
//! [`DiskRequest`]s to a [`DiskScheduler`] and blocks on the paired
//! [`DiskFuture`] until the request's promise is fulfilled. This keeps
//! the pool independent of how I/O is actually performed: the default
//! [`FileDiskScheduler`] drains requests on a worker thread, while tests
//! use the in-memory scheduler from [`super::memory`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use keel_common::types::PageId;
use tracing::trace;

use super::error::{DiskError, DiskResult};
use super::manager::DiskManager;

/// The I/O operation carried by a request.
#[derive(Debug)]
pub enum DiskOp {
    /// Read one page; the completion carries the page contents.
    Read,
    /// Write one page of data; the completion carries an empty payload.
    Write(Bytes),
}

/// A single page-granular I/O request.
pub struct DiskRequest {
    /// The page the request targets.
    pub page_id: PageId,
    /// What to do.
    pub op: DiskOp,
    /// Fulfilled by the scheduler once the I/O is done.
    pub completion: DiskPromise,
}

/// The producer half of a request completion.
pub struct DiskPromise {
    tx: flume::Sender<DiskResult<Bytes>>,
}

impl DiskPromise {
    /// Fulfills the promise, waking the paired [`DiskFuture`].
    ///
    /// If the future was dropped the result is discarded.
    pub fn fulfill(self, result: DiskResult<Bytes>) {
        let _ = self.tx.send(result);
    }
}

/// The consumer half of a request completion.
pub struct DiskFuture {
    rx: flume::Receiver<DiskResult<Bytes>>,
}

impl DiskFuture {
    /// Blocks until the paired promise is fulfilled.
    ///
    /// Read requests complete with the page contents; writes complete
    /// with an empty payload. I/O failures are delivered here.
    pub fn wait(self) -> DiskResult<Bytes> {
        match self.rx.recv() {
            Ok(result) => result,
            // Promise dropped without being fulfilled.
            Err(_) => Err(DiskError::Stopped),
        }
    }
}

/// Creates a connected promise/future pair for one request.
pub fn completion_pair() -> (DiskPromise, DiskFuture) {
    let (tx, rx) = flume::bounded(1);
    (DiskPromise { tx }, DiskFuture { rx })
}

/// The capability the buffer pool consumes to reach the page store.
///
/// Implementations must be safe to share across threads. `schedule`
/// must eventually fulfill every accepted request's promise, delivering
/// errors through it rather than panicking.
pub trait DiskScheduler: Send + Sync {
    /// Submits a request for execution.
    fn schedule(&self, request: DiskRequest);

    /// Size in bytes of the pages this scheduler serves.
    fn page_size(&self) -> usize;

    /// Submits a read of `page_id`, returning the future to wait on.
    fn read_page(&self, page_id: PageId) -> DiskFuture {
        let (completion, future) = completion_pair();
        self.schedule(DiskRequest {
            page_id,
            op: DiskOp::Read,
            completion,
        });
        future
    }

    /// Submits a write of `data` under `page_id`, returning the future
    /// to wait on.
    fn write_page(&self, page_id: PageId, data: Bytes) -> DiskFuture {
        let (completion, future) = completion_pair();
        self.schedule(DiskRequest {
            page_id,
            op: DiskOp::Write(data),
            completion,
        });
        future
    }
}

/// Scheduler that executes requests against a [`DiskManager`] on a
/// dedicated worker thread.
///
/// Requests are queued in submission order. Dropping the scheduler
/// closes the queue and joins the worker; any request scheduled after
/// shutdown fails with [`DiskError::Stopped`].
pub struct FileDiskScheduler {
    queue: Option<flume::Sender<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
    page_size: usize,
}

impl FileDiskScheduler {
    /// Starts a scheduler over the given page store.
    pub fn new(manager: DiskManager) -> Self {
        let page_size = manager.page_size();
        let manager = Arc::new(manager);
        let (tx, rx) = flume::unbounded::<DiskRequest>();

        let worker = thread::Builder::new()
            .name("keel-disk-io".into())
            .spawn(move || run_worker(manager, rx))
            .expect("failed to spawn disk I/O worker");

        Self {
            queue: Some(tx),
            worker: Some(worker),
            page_size,
        }
    }
}

impl DiskScheduler for FileDiskScheduler {
    fn schedule(&self, request: DiskRequest) {
        // queue is Some for the scheduler's whole lifetime; it is only
        // taken inside drop.
        let queue = self.queue.as_ref().expect("scheduler is running");
        if let Err(rejected) = queue.send(request) {
            rejected.into_inner().completion.fulfill(Err(DiskError::Stopped));
        }
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Drop for FileDiskScheduler {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain what is left and exit.
        drop(self.queue.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for FileDiskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskScheduler")
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn run_worker(manager: Arc<DiskManager>, rx: flume::Receiver<DiskRequest>) {
    for request in rx.iter() {
        trace!(page_id = %request.page_id, op = ?request.op, "executing disk request");
        let result = match request.op {
            DiskOp::Read => {
                let mut buf = vec![0u8; manager.page_size()];
                manager
                    .read_page(request.page_id, &mut buf)
                    .map(|()| Bytes::from(buf))
            }
            DiskOp::Write(data) => manager
                .write_page(request.page_id, &data)
                .map(|()| Bytes::new()),
        };
        request.completion.fulfill(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 512;

    fn scheduler(dir: &tempfile::TempDir) -> FileDiskScheduler {
        let manager = DiskManager::open(dir.path().join("pages.db"), PAGE_SIZE).unwrap();
        FileDiskScheduler::new(manager)
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let disk = scheduler(&dir);

        let mut page = vec![0u8; PAGE_SIZE];
        page[..4].copy_from_slice(b"data");
        disk.write_page(PageId::new(0), Bytes::from(page.clone()))
            .wait()
            .unwrap();

        let read = disk.read_page(PageId::new(0)).wait().unwrap();
        assert_eq!(&read[..], &page[..]);
    }

    #[test]
    fn test_requests_complete_in_order() {
        let dir = tempdir().unwrap();
        let disk = scheduler(&dir);

        let futures: Vec<_> = (0..16)
            .map(|i| {
                let page = vec![i as u8; PAGE_SIZE];
                disk.write_page(PageId::new(i), Bytes::from(page))
            })
            .collect();
        for future in futures {
            future.wait().unwrap();
        }

        for i in 0..16 {
            let read = disk.read_page(PageId::new(i)).wait().unwrap();
            assert!(read.iter().all(|&b| b == i as u8));
        }
    }

    #[test]
    fn test_bad_write_reports_through_future() {
        let dir = tempdir().unwrap();
        let disk = scheduler(&dir);

        let result = disk
            .write_page(PageId::new(0), Bytes::from_static(b"too short"))
            .wait();
        assert!(matches!(result, Err(DiskError::PayloadSize { .. })));
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let dir = tempdir().unwrap();
        let page = vec![9u8; PAGE_SIZE];

        let future = {
            let disk = scheduler(&dir);
            disk.write_page(PageId::new(5), Bytes::from(page.clone()))
            // scheduler dropped here; queued request must still finish
        };
        future.wait().unwrap();

        let manager = DiskManager::open(dir.path().join("pages.db"), PAGE_SIZE).unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        manager.read_page(PageId::new(5), &mut buf).unwrap();
        assert_eq!(buf, page);
    }
}
