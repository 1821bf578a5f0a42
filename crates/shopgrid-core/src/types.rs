//! # Domain Types
//!
//! Entity records for the shopgrid catalog.
//!
//! ## Entity Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                                                                     │
//! │  ┌──────────────┐      ┌───────────────────┐     ┌──────────────┐  │
//! │  │   Category   │◄─────│  PosCategoryLink  │────►│ PointOfSale  │  │
//! │  │  in_use      │      │  position         │     │  in_use      │  │
//! │  └──────┬───────┘      └───────────────────┘     └──────────────┘  │
//! │         │ name_id / description_id                                 │
//! │         ▼                                                          │
//! │  ┌──────────────┐                                                  │
//! │  │ DefaultText  │                                                  │
//! │  └──────────────┘                                                  │
//! │                                                                     │
//! │  Invariant: a point of sale is in_use iff at least one category    │
//! │  reachable through its links is in_use. Maintained by explicit     │
//! │  propagation calls, not by a database constraint.                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Common Fields
//! Every entity carries:
//! - `id`: surrogate identifier, `None` until first persisted
//! - `version`: optimistic-concurrency stamp, `None` while detached-new,
//!   `0` after insert, advanced by every successful update
//! - `updated_at`: wall-clock time of the last write
//!
//! ## Identity Equality
//! Two entity values are equal iff their ids are equal. Field contents do
//! not participate in equality.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// DefaultText
// =============================================================================

/// Default-locale display text, referenced by categories for name and
/// description. Texts for other locales link back to these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DefaultText {
    pub id: Option<i64>,
    pub text: String,
    pub version: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl DefaultText {
    /// Creates a detached text row ready to be persisted.
    pub fn new(text: impl Into<String>) -> Self {
        DefaultText {
            id: None,
            text: text.into(),
            version: None,
            updated_at: Utc::now(),
        }
    }
}

impl PartialEq for DefaultText {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// =============================================================================
// Category
// =============================================================================

/// A catalog category. `name_id` and `description_id` reference
/// [`DefaultText`] rows and may be unset on freshly imported rows.
///
/// `in_use` here is an independent activation flag; the derived flag lives on
/// [`PointOfSale`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Option<i64>,
    pub name_id: Option<i64>,
    pub description_id: Option<i64>,
    pub in_use: bool,
    pub version: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Creates a detached category with the activation flag off.
    pub fn new() -> Self {
        Category {
            id: None,
            name_id: None,
            description_id: None,
            in_use: false,
            version: None,
            updated_at: Utc::now(),
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::new()
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// =============================================================================
// PointOfSale
// =============================================================================

/// A sales surface the category tree is partitioned into (e.g. in-game store
/// vs. web store).
///
/// `in_use` is the derived flag: true iff at least one linked category is
/// in use. It is maintained by the association repository's propagation
/// operations, never recomputed on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointOfSale {
    pub id: Option<i64>,
    pub name: String,
    pub in_use: bool,
    pub version: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl PointOfSale {
    /// Creates a detached point of sale with the derived flag off.
    pub fn new(name: impl Into<String>) -> Self {
        PointOfSale {
            id: None,
            name: name.into(),
            in_use: false,
            version: None,
            updated_at: Utc::now(),
        }
    }
}

impl PartialEq for PointOfSale {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// =============================================================================
// PosCategoryLink
// =============================================================================

/// One edge in the bipartite graph between points of sale and categories.
///
/// Rows are created and removed independently of the entities they
/// reference; removing a link never removes the category or point of sale.
/// `position` orders the categories within one point of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PosCategoryLink {
    pub id: Option<i64>,
    pub point_of_sale_id: i64,
    pub category_id: i64,
    pub position: i64,
    pub version: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl PosCategoryLink {
    /// Creates a detached link between an existing point of sale and an
    /// existing category.
    pub fn new(point_of_sale_id: i64, category_id: i64) -> Self {
        PosCategoryLink {
            id: None,
            point_of_sale_id,
            category_id,
            position: 0,
            version: None,
            updated_at: Utc::now(),
        }
    }
}

impl PartialEq for PosCategoryLink {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
