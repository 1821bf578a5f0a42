//! # Repository Module
//!
//! One repository per entity type, each a thin composition over the generic
//! [`Dao`](crate::dao::Dao) facade plus the queries specific to that entity.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  service layer                                                      │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  DefaultTextRepository     texts referenced by categories           │
//! │  CategoryRepository        categories + per-POS category queries    │
//! │  PointOfSaleRepository     points of sale                           │
//! │  PosCategoryRepository     association rows + in-use propagation    │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Dao<T> facade ──► SqlQuery ──► session transaction                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Entity`/`Versioned` trait impls binding each entity to its table
//! live next to the repository that owns them.

pub mod category;
pub mod default_text;
pub mod point_of_sale;
pub mod pos_category;
