//! # shopgrid-core: Pure Domain Types
//!
//! Domain types shared by the whole shopgrid workspace.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  HTTP / transport collaborator                  │
//! │        (not part of this workspace; consumes services)         │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────▼─────────────────────────────────┐
//! │                 ★ shopgrid-core (THIS CRATE) ★                  │
//! │                                                                 │
//! │   ┌────────────────────┐      ┌────────────────────┐           │
//! │   │       types        │      │       paging       │           │
//! │   │ Category           │      │ page_window()      │           │
//! │   │ PointOfSale        │      │ default constants  │           │
//! │   │ PosCategoryLink    │      └────────────────────┘           │
//! │   │ DefaultText        │                                       │
//! │   └────────────────────┘                                       │
//! │                                                                 │
//! │   NO I/O • NO DATABASE • NO NETWORK                             │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────▼─────────────────────────────────┐
//! │                   shopgrid-db (persistence layer)               │
//! │       pool, migrations, query executor, DAO facade, services    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity records (Category, PointOfSale, PosCategoryLink,
//!   DefaultText)
//! - [`paging`] - Pagination window arithmetic and its default constants

// =============================================================================
// Module Declarations
// =============================================================================

pub mod paging;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use paging::{page_window, DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE};
pub use types::{Category, DefaultText, PointOfSale, PosCategoryLink};
