//! # Pagination Window
//!
//! Translates the `(page_size, page_number)` convention used by list callers
//! into an `(offset, limit)` window for the query executor.
//!
//! ## Coercion Policy
//! ```text
//! page_size == 0             pagination disabled, full result set
//! page_size  < 0             coerced to DEFAULT_PAGE_SIZE (10)
//! page_number <= 0           coerced to DEFAULT_PAGE_NUMBER (1)
//! offset = (page_number - 1) * page_size
//! ```
//!
//! Existing callers depend on the silent coercion of out-of-range inputs;
//! the policy is preserved exactly and kept as a pure function so it can be
//! tested in isolation.

/// Page number substituted for non-positive page numbers.
pub const DEFAULT_PAGE_NUMBER: i64 = 1;

/// Page size substituted for negative page sizes.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Computes the `(offset, limit)` window for a paged query.
///
/// Returns `None` when `page_size` is exactly zero, which disables
/// pagination regardless of `page_number`.
///
/// ## Example
/// ```rust
/// use shopgrid_core::paging::page_window;
///
/// assert_eq!(page_window(20, 3), Some((40, 20)));
/// assert_eq!(page_window(0, 99), None);
/// assert_eq!(page_window(-5, -3), Some((0, 10)));
/// ```
pub fn page_window(page_size: i64, page_number: i64) -> Option<(i64, i64)> {
    if page_size == 0 {
        return None;
    }

    let size = if page_size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    let number = if page_number <= 0 {
        DEFAULT_PAGE_NUMBER
    } else {
        page_number
    };

    Some(((number - 1) * size, size))
}

// =============================================================================
// Unit Tests
// =============================================================================
