//! # keel-storage
//!
//! Disk-backed page storage for KeelDB.
//!
//! This crate implements the layer that mediates between a fixed-size
//! in-memory page cache and a larger on-disk page store:
//!
//! - a buffer pool with pin-based page lifetime and LRU-K eviction
//! - scoped page guards that tie pins and latches to lexical scope
//! - a disk scheduler abstraction over page-granular block I/O

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool, replacement policy, and page guards
pub mod buffer;

/// Disk scheduler and page store backends
pub mod disk;
