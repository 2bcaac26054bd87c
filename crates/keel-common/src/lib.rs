//! # keel-common
//!
//! Common types and constants for KeelDB.
//!
//! This crate provides the foundational vocabulary shared by the storage
//! engine components:
//!
//! - **Types**: core identifiers (`PageId`, `Lsn`)
//! - **Constants**: page geometry and buffer pool limits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, PageId};
