//! System-wide constants for KeelDB.

// =============================================================================
// Page Geometry
// =============================================================================

/// Default page size in bytes (4 KB).
///
/// Matches the typical OS page size and SSD block size.
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// Minimum page size in bytes.
pub const MIN_PAGE_SIZE: usize = 512;

/// Maximum page size in bytes (64 KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Buffer Pool
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_POOL_FRAMES: usize = 1024;

/// Default history depth for the LRU-K replacement policy.
pub const DEFAULT_REPLACER_K: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_constants() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert!(MIN_PAGE_SIZE.is_power_of_two());
        assert!(MAX_PAGE_SIZE.is_power_of_two());
        assert!(MIN_PAGE_SIZE <= DEFAULT_PAGE_SIZE);
        assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
    }

    #[test]
    fn test_buffer_pool_constants() {
        assert!(DEFAULT_BUFFER_POOL_FRAMES > 0);
        assert!(DEFAULT_REPLACER_K >= 1);
    }
}
