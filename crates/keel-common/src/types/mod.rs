//! Type definitions for KeelDB.

mod ids;

pub use ids::{Lsn, PageId};
