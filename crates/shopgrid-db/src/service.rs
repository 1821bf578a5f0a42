//! # Entity Service Layer
//!
//! Thin orchestration over the DAO facade: save-or-create-or-update
//! semantics, and translation of store-level failures into the domain-level
//! failures callers present to users.
//!
//! ## Failure Translation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  DbError::ConcurrentModification ──► ServiceError::EditConflict     │
//! │  DbError::ConcurrencyLock        ──► ServiceError::ConcurrencyLock  │
//! │  every other DbError             ──► ServiceError::Failure          │
//! │                                      (message + wrapped cause)      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two concurrency kinds stay distinct so the transport layer can answer
//! "someone else changed this - reload and retry"; everything else collapses
//! into one generic failure kind.

use thiserror::Error;
use tracing::error;

use shopgrid_core::{Category, PointOfSale};

use crate::dao::{Dao, Versioned};
use crate::error::DbError;
use crate::query::SqlParam;
use crate::repository::category::CategoryRepository;
use crate::session::Session;

// =============================================================================
// ServiceError
// =============================================================================

/// Domain-level failures surfaced to the transport layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Another writer changed the entity since the caller read it.
    #[error("another user has modified {entity} and the system could not save your changes")]
    EditConflict {
        entity: String,
        #[source]
        source: DbError,
    },

    /// The entity was deleted by another writer between read and write.
    #[error("{entity} was deleted by another transaction; reload before saving")]
    ConcurrencyLock {
        entity: String,
        #[source]
        source: DbError,
    },

    /// Any other failure, carrying a readable message and the original
    /// cause.
    #[error("{message}")]
    Failure {
        message: String,
        #[source]
        source: Option<DbError>,
    },
}

impl ServiceError {
    /// Whether reloading and retrying can resolve the failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::EditConflict { .. } | ServiceError::ConcurrencyLock { .. }
        )
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::ConcurrentModification { entity, .. } => {
                let entity = entity.clone();
                ServiceError::EditConflict {
                    entity,
                    source: err,
                }
            }
            DbError::ConcurrencyLock { entity, .. } => {
                let entity = entity.clone();
                ServiceError::ConcurrencyLock {
                    entity,
                    source: err,
                }
            }
            _ => ServiceError::Failure {
                message: err.to_string(),
                source: Some(err),
            },
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// EntityService
// =============================================================================

/// Generic service over one entity type.
///
/// ## Example
/// ```rust,ignore
/// let service: EntityService<PointOfSale> = EntityService::new();
/// let mut session = db.begin().await?;
///
/// let mut pos = PointOfSale::new("web store");
/// let saved = service.save(&mut session, &mut pos).await?;
/// session.commit().await?;
/// ```
#[derive(Debug, Clone)]
pub struct EntityService<T: Versioned> {
    dao: Dao<T>,
}

impl<T: Versioned> Default for EntityService<T> {
    fn default() -> Self {
        EntityService::new()
    }
}

impl<T: Versioned> EntityService<T> {
    pub fn new() -> Self {
        EntityService { dao: Dao::new() }
    }

    /// The underlying DAO facade.
    pub fn dao(&self) -> &Dao<T> {
        &self.dao
    }

    /// Resolves an entity by id; `None` when no row exists.
    pub async fn get_item_by_id(
        &self,
        session: &mut Session,
        id: i64,
    ) -> ServiceResult<Option<T>> {
        Ok(self.dao.find(session, id).await?)
    }

    /// Whether the entity's identity is managed by this unit of work.
    pub fn contains(&self, session: &Session, entity: &T) -> bool {
        session.contains::<T>(entity.id())
    }

    /// Makes a new entity managed and persistent.
    pub async fn create(&self, session: &mut Session, entity: &mut T) -> ServiceResult<()> {
        Ok(self.dao.persist(session, entity).await?)
    }

    /// Merges the entity's state into the store.
    ///
    /// A stamp conflict surfaces as [`ServiceError::EditConflict`]; a merge
    /// target deleted by another writer as
    /// [`ServiceError::ConcurrencyLock`].
    pub async fn update(&self, session: &mut Session, entity: &T) -> ServiceResult<T> {
        Ok(self.dao.merge(session, entity).await?)
    }

    /// Updates when the identity is already managed by this unit of work,
    /// creates otherwise.
    pub async fn save(&self, session: &mut Session, entity: &mut T) -> ServiceResult<T> {
        if self.contains(session, entity) {
            self.update(session, entity).await
        } else {
            self.create(session, entity).await?;
            Ok(entity.clone())
        }
    }

    /// Reloads the entity's state from the store, discarding local edits.
    pub async fn refresh(&self, session: &mut Session, entity: &mut T) -> ServiceResult<()> {
        Ok(self.dao.refresh(session, entity).await?)
    }

    /// Every row of the entity's table.
    pub async fn get_list(&self, session: &mut Session) -> ServiceResult<Vec<T>> {
        Ok(self.dao.list(session).await?)
    }

    /// Rows matching a query, windowed by `(offset, limit)`.
    pub async fn get_by_list(
        &self,
        session: &mut Session,
        sql: &str,
        offset: i64,
        limit: i64,
        params: &[SqlParam],
    ) -> ServiceResult<Vec<T>> {
        Ok(self
            .dao
            .list_by_window(session, sql, offset, limit, params)
            .await?)
    }

    /// The row with the highest identity value, or `None`.
    pub async fn last_record(&self, session: &mut Session) -> ServiceResult<Option<T>> {
        Ok(self.dao.last_record(session).await?)
    }
}

// =============================================================================
// PointOfSaleService
// =============================================================================

/// Service for point-of-sale business operations.
#[derive(Debug, Clone, Default)]
pub struct PointOfSaleService {
    entities: EntityService<PointOfSale>,
    categories: CategoryRepository,
}

impl PointOfSaleService {
    pub fn new() -> Self {
        PointOfSaleService {
            entities: EntityService::new(),
            categories: CategoryRepository::new(),
        }
    }

    /// The generic entity operations for points of sale.
    pub fn entities(&self) -> &EntityService<PointOfSale> {
        &self.entities
    }

    /// Categories linked to the given point of sale, in link order.
    pub async fn categories_for_pos(
        &self,
        session: &mut Session,
        point_of_sale_id: i64,
    ) -> ServiceResult<Vec<Category>> {
        self.categories
            .categories_for_point_of_sale(session, point_of_sale_id)
            .await
            .map_err(|err| {
                error!(point_of_sale = point_of_sale_id, error = %err, "category lookup failed");
                ServiceError::from(err)
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::Entity;
    use crate::pool::{Database, DbConfig};
    use shopgrid_core::PosCategoryLink;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_creates_unmanaged_and_updates_managed() {
        let db = test_db().await;
        let service: EntityService<PointOfSale> = EntityService::new();
        let mut session = db.begin().await.unwrap();

        // Unmanaged entity: save dispatches to create
        let mut pos = PointOfSale::new("web store");
        assert!(!service.contains(&session, &pos));
        let saved = service.save(&mut session, &mut pos).await.unwrap();
        assert_eq!(saved.version, Some(0));

        // Now managed: save dispatches to update and advances the stamp
        pos.name = "renamed store".to_string();
        let saved = service.save(&mut session, &mut pos).await.unwrap();
        assert_eq!(saved.version, Some(1));
        assert_eq!(saved.name, "renamed store");
    }

    #[tokio::test]
    async fn test_create_duplicate_is_a_generic_failure_with_cause() {
        let db = test_db().await;
        let service: EntityService<PointOfSale> = EntityService::new();
        let mut session = db.begin().await.unwrap();

        let mut pos = PointOfSale::new("web store");
        service.create(&mut session, &mut pos).await.unwrap();

        let mut copy = pos.clone();
        let err = service.create(&mut session, &mut copy).await.unwrap_err();
        match err {
            ServiceError::Failure { source, .. } => {
                assert!(matches!(source, Some(DbError::DuplicateEntity { .. })));
            }
            other => panic!("expected Failure, got {other:?}"),
        }
        assert!(!ServiceError::from(DbError::TransactionRequired).is_retryable());
    }

    #[tokio::test]
    async fn test_update_conflict_is_an_edit_conflict() {
        let db = test_db().await;
        let service: EntityService<PointOfSale> = EntityService::new();

        let mut session = db.begin().await.unwrap();
        let mut pos = PointOfSale::new("web store");
        service.create(&mut session, &mut pos).await.unwrap();
        session.commit().await.unwrap();

        // Another writer advances the stamp
        let mut session = db.begin().await.unwrap();
        let mut other_edit = pos.clone();
        other_edit.name = "their edit".to_string();
        service.update(&mut session, &other_edit).await.unwrap();
        session.commit().await.unwrap();

        // The stale detached copy now fails distinctly
        let mut session = db.begin().await.unwrap();
        let mut stale_edit = pos.clone();
        stale_edit.name = "my edit".to_string();
        let err = service.update(&mut session, &stale_edit).await.unwrap_err();
        assert!(matches!(err, ServiceError::EditConflict { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("another user has modified"));
    }

    #[tokio::test]
    async fn test_update_of_deleted_row_is_a_concurrency_lock() {
        let db = test_db().await;
        let service: EntityService<PointOfSale> = EntityService::new();

        let mut session = db.begin().await.unwrap();
        let mut pos = PointOfSale::new("doomed store");
        service.create(&mut session, &mut pos).await.unwrap();
        session.commit().await.unwrap();

        let mut session = db.begin().await.unwrap();
        let managed = service
            .get_item_by_id(&mut session, pos.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        service.dao().remove(&mut session, &managed).await.unwrap();
        session.commit().await.unwrap();

        let mut session = db.begin().await.unwrap();
        let err = service.update(&mut session, &pos).await.unwrap_err();
        assert!(matches!(err, ServiceError::ConcurrencyLock { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_detached_json_payload_merges_through_the_service() {
        let db = test_db().await;
        let service: EntityService<PointOfSale> = EntityService::new();

        let mut session = db.begin().await.unwrap();
        let mut pos = PointOfSale::new("web store");
        service.create(&mut session, &mut pos).await.unwrap();
        session.commit().await.unwrap();

        // The payload a client sends back after editing offline
        let payload = serde_json::json!({
            "id": pos.id,
            "name": "client edit",
            "in_use": false,
            "version": 0,
            "updated_at": pos.updated_at,
        });
        let detached: PointOfSale = serde_json::from_value(payload).unwrap();

        let mut session = db.begin().await.unwrap();
        let merged = service.update(&mut session, &detached).await.unwrap();
        assert_eq!(merged.name, "client edit");
        assert_eq!(merged.version, Some(1));
    }

    #[tokio::test]
    async fn test_get_list_and_get_by_list() {
        let db = test_db().await;
        let service: EntityService<PointOfSale> = EntityService::new();
        let mut session = db.begin().await.unwrap();

        for i in 0..4 {
            let mut pos = PointOfSale::new(format!("store {i}"));
            service.create(&mut session, &mut pos).await.unwrap();
        }

        let all = service.get_list(&mut session).await.unwrap();
        assert_eq!(all.len(), 4);

        let windowed = service
            .get_by_list(
                &mut session,
                &format!("SELECT * FROM {} ORDER BY id", PointOfSale::TABLE),
                1,
                2,
                &[],
            )
            .await
            .unwrap();
        assert_eq!(windowed.len(), 2);
        assert_eq!(windowed[0].name, "store 1");

        let last = service.last_record(&mut session).await.unwrap().unwrap();
        assert_eq!(last.name, "store 3");
    }

    #[tokio::test]
    async fn test_categories_for_pos() {
        let db = test_db().await;
        let service = PointOfSaleService::new();
        let mut session = db.begin().await.unwrap();

        let mut pos = PointOfSale::new("web store");
        service
            .entities()
            .create(&mut session, &mut pos)
            .await
            .unwrap();
        let pos_id = pos.id.unwrap();

        let mut category = Category::new();
        db.categories()
            .dao()
            .persist(&mut session, &mut category)
            .await
            .unwrap();
        let mut link = PosCategoryLink::new(pos_id, category.id.unwrap());
        db.pos_categories()
            .dao()
            .persist(&mut session, &mut link)
            .await
            .unwrap();

        let categories = service.categories_for_pos(&mut session, pos_id).await.unwrap();
        assert_eq!(categories, vec![category]);

        // A point of sale with no links yields an empty list, not a failure
        let none = service.categories_for_pos(&mut session, 9999).await.unwrap();
        assert!(none.is_empty());
    }
}
