//! # shopgrid-db: Persistence Layer
//!
//! Database access for the shopgrid catalog: SQLite via sqlx, a generic DAO
//! facade with optimistic concurrency, and the repositories and services
//! built on top of it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request handler (HTTP collaborator - not part of this workspace)       │
//! │       │  opens one Session per request, commits on success              │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   shopgrid-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   service.rs      EntityService / PointOfSaleService            │   │
//! │  │        │          DbError -> ServiceError translation           │   │
//! │  │        ▼                                                        │   │
//! │  │   repository/     per-entity repositories, in-use propagation   │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   dao.rs          generic Dao<T> facade + merge engine          │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   query.rs        parameterized statements, windowing           │   │
//! │  │   session.rs      transaction + identity tracking               │   │
//! │  │   pool.rs         SqlitePool + DbConfig                         │   │
//! │  │   migrations.rs   embedded schema migrations                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL mode, foreign keys on)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopgrid_db::{Database, DbConfig, EntityService};
//! use shopgrid_core::PointOfSale;
//!
//! let db = Database::new(DbConfig::new("./shopgrid.db")).await?;
//! let service: EntityService<PointOfSale> = EntityService::new();
//!
//! let mut session = db.begin().await?;
//! let mut pos = PointOfSale::new("web store");
//! service.save(&mut session, &mut pos).await?;
//! session.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dao;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;
pub mod service;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use dao::{Dao, Entity, Versioned};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use query::{SqlParam, SqlQuery};
pub use service::{EntityService, PointOfSaleService, ServiceError, ServiceResult};
pub use session::Session;

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::default_text::DefaultTextRepository;
pub use repository::point_of_sale::PointOfSaleRepository;
pub use repository::pos_category::PosCategoryRepository;
