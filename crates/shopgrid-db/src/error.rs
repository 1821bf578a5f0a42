//! # Database Error Types
//!
//! The store-level failure taxonomy for shopgrid-db.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SQLite error (sqlx::Error)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  DbError (this module)     categorized store failure                │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ServiceError (service.rs) domain failure shown to callers          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "No row found" is NOT part of this taxonomy for lookups: find-style
//! operations return `Ok(None)`. `NotFound` is reserved for operations that
//! require the row to exist (refresh, propagation targets).

use thiserror::Error;

/// Store-level operation failures.
#[derive(Debug, Error)]
pub enum DbError {
    /// A row that an operation requires does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Attempted creation of an entity whose identity already exists.
    ///
    /// ## When This Occurs
    /// - `persist` with an id already managed in this unit of work
    /// - `persist` with an id that already has a row
    /// - a UNIQUE index violation reported by the store
    #[error("{entity} {id} already exists")]
    DuplicateEntity { entity: String, id: String },

    /// Operation invoked in the wrong lifecycle state.
    ///
    /// ## When This Occurs
    /// - `remove` on an entity not managed by the unit of work
    /// - merge of an entity that was never persisted
    /// - operations against a closed pool
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Version-stamp mismatch during merge: the entity was changed by
    /// another writer since the caller last read it. Recoverable by
    /// reloading and retrying; never retried internally.
    #[error("{entity} {id} was modified by another transaction")]
    ConcurrentModification { entity: String, id: i64 },

    /// The merge target vanished: the entity was deleted by another writer
    /// between the caller's read and this write.
    #[error("{entity} {id} was deleted by another transaction")]
    ConcurrencyLock { entity: String, id: i64 },

    /// Operation needs an active transaction and none is bound.
    #[error("operation requires an active transaction")]
    TransactionRequired,

    /// Could not reach or open the database.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Statement execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a DuplicateEntity error.
    pub fn duplicate(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::DuplicateEntity {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound   -> DbError::NotFound
/// sqlx::Error::Database      -> constraint analysis on the message
/// sqlx::Error::PoolTimedOut  -> DbError::ConnectionFailed
/// sqlx::Error::PoolClosed    -> DbError::InvalidState (closed connection)
/// other                      -> DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let target = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::DuplicateEntity {
                        entity: target,
                        id: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionFailed("connection pool timed out".to_string())
            }

            sqlx::Error::PoolClosed => {
                DbError::InvalidState("connection pool is closed".to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DbError::not_found("Category", 17);
        assert_eq!(err.to_string(), "Category not found: 17");

        let err = DbError::duplicate("PointOfSale", 4);
        assert_eq!(err.to_string(), "PointOfSale 4 already exists");

        let err = DbError::ConcurrentModification {
            entity: "PointOfSale".to_string(),
            id: 4,
        };
        assert_eq!(
            err.to_string(),
            "PointOfSale 4 was modified by another transaction"
        );

        let err = DbError::ConcurrencyLock {
            entity: "Category".to_string(),
            id: 9,
        };
        assert_eq!(
            err.to_string(),
            "Category 9 was deleted by another transaction"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
