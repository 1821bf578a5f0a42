//! # Generic DAO Facade
//!
//! One type-parameterized data-access object per entity type, plus the
//! optimistic merge engine.
//!
//! ## Merge Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  detached entity from caller (possibly stale)                           │
//! │       │                                                                 │
//! │       ├── no stamp on the value ───► merge_unchecked (legacy path,     │
//! │       │                              no concurrent-edit detection)     │
//! │       ▼                                                                 │
//! │  identity managed in this unit of work?                                 │
//! │       │                                                                 │
//! │       ├── yes ──► apply onto the copy this transaction owns            │
//! │       │           (no stamp comparison)                                 │
//! │       ▼                                                                 │
//! │  compare-and-swap:                                                      │
//! │    UPDATE t SET ..., version = version + 1                              │
//! │    WHERE id = ? AND version = <expected>                                │
//! │       │                                                                 │
//! │       ├── 1 row  ──► stamp advanced, return the managed copy           │
//! │       └── 0 rows ──► row still there ──► ConcurrentModification        │
//! │                      row gone        ──► ConcurrencyLock               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both failure kinds are recoverable by reloading and retrying; the engine
//! surfaces them and never retries on its own, since the caller's view of
//! the data is stale either way.

use std::fmt;
use std::marker::PhantomData;

use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use tracing::{debug, warn};

use shopgrid_core::page_window;

use crate::error::{DbError, DbResult};
use crate::query::{SqlParam, SqlQuery};
use crate::session::Session;

// =============================================================================
// Entity Traits
// =============================================================================

/// Statically declared persistence metadata for one entity type.
///
/// `DATA_COLUMNS` and `data_values` list every column except `id` and
/// `version`, in the same order.
pub trait Entity: Clone + Send + Sync + Unpin + for<'r> FromRow<'r, SqliteRow> {
    /// Display name used in failure messages.
    const NAME: &'static str;

    /// Backing table.
    const TABLE: &'static str;

    /// Columns written on insert and update, excluding `id` and `version`.
    const DATA_COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Parameter values parallel to `DATA_COLUMNS`.
    fn data_values(&self) -> Vec<SqlParam>;

    /// Refreshes the entity's `updated_at` stamp; called before every write.
    fn touch(&mut self);
}

/// Typed access to the optimistic-concurrency stamp.
///
/// Every entity type declares this capability directly; the merge engine
/// reads and overwrites the stamp through these accessors alone.
pub trait Versioned: Entity {
    fn version(&self) -> Option<i64>;

    fn set_version(&mut self, version: Option<i64>);
}

// =============================================================================
// Dao
// =============================================================================

/// Generic data-access object for one entity type.
///
/// Stateless: every operation joins the ambient transaction of the
/// [`Session`] passed to it.
///
/// ## Example
/// ```rust,ignore
/// let dao: Dao<PointOfSale> = Dao::new();
/// let mut session = db.begin().await?;
///
/// let mut pos = PointOfSale::new("web store");
/// dao.persist(&mut session, &mut pos).await?;
/// let found = dao.find(&mut session, pos.id.unwrap()).await?;
/// session.commit().await?;
/// ```
pub struct Dao<T> {
    _entity: PhantomData<fn() -> T>,
}

impl<T> Dao<T> {
    pub fn new() -> Self {
        Dao {
            _entity: PhantomData,
        }
    }
}

impl<T> Default for Dao<T> {
    fn default() -> Self {
        Dao::new()
    }
}

impl<T> Clone for Dao<T> {
    fn clone(&self) -> Self {
        Dao::new()
    }
}

impl<T> fmt::Debug for Dao<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dao<{}>", std::any::type_name::<T>())
    }
}

impl<T: Entity> Dao<T> {
    /// Marks fetched rows as managed by the unit of work.
    fn track_all(session: &mut Session, rows: &[T]) {
        for row in rows {
            if let Some(id) = row.id() {
                session.track::<T>(id);
            }
        }
    }

    /// Resolves an entity by identity; `None` when no row exists.
    pub async fn find(&self, session: &mut Session, id: i64) -> DbResult<Option<T>> {
        let found: Option<T> = SqlQuery::new(format!("SELECT * FROM {} WHERE id = ?", T::TABLE))
            .bind(id)
            .fetch_optional(session.conn())
            .await?;

        if found.is_some() {
            session.track::<T>(id);
        }
        Ok(found)
    }

    /// Resolves by a caller-supplied raw identifier (e.g. a path segment).
    ///
    /// Malformed input degrades to `None` instead of propagating a lookup
    /// error; callers relying on typed errors must not expect a distinction
    /// between "no such row" and "unparseable id".
    pub async fn find_by_raw_id(&self, session: &mut Session, raw: &str) -> DbResult<Option<T>> {
        match raw.trim().parse::<i64>() {
            Ok(id) => self.find(session, id).await,
            Err(_) => {
                warn!(entity = T::NAME, raw = %raw, "malformed identifier, treating as absent");
                Ok(None)
            }
        }
    }

    /// Resolves the single row where `column = value`.
    ///
    /// At most one match is the caller's contract. When more than one row
    /// matches, the first row is returned and the violation is logged.
    pub async fn find_by_field(
        &self,
        session: &mut Session,
        column: &str,
        value: impl Into<SqlParam>,
    ) -> DbResult<Option<T>> {
        let matches: Vec<T> =
            SqlQuery::new(format!("SELECT * FROM {} WHERE {} = ?", T::TABLE, column))
                .bind(value)
                .window(0, 2)
                .fetch_all(session.conn())
                .await?;

        if matches.len() > 1 {
            warn!(
                table = T::TABLE,
                column = column,
                "find_by_field matched more than one row, returning the first"
            );
        }

        let first = matches.into_iter().next();
        if let Some(entity) = &first {
            if let Some(id) = entity.id() {
                session.track::<T>(id);
            }
        }
        Ok(first)
    }

    /// Lists every row of the entity's table.
    pub async fn list(&self, session: &mut Session) -> DbResult<Vec<T>> {
        self.list_by(session, &format!("SELECT * FROM {}", T::TABLE), &[])
            .await
    }

    /// Lists rows matching a query with positional parameters.
    pub async fn list_by(
        &self,
        session: &mut Session,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        let mut query = SqlQuery::new(sql);
        for param in params {
            query = query.bind(param.clone());
        }

        let rows: Vec<T> = query.fetch_all(session.conn()).await?;
        Self::track_all(session, &rows);
        Ok(rows)
    }

    /// Lists rows matching a query with named parameters.
    pub async fn list_by_named(
        &self,
        session: &mut Session,
        sql: &str,
        named: &[(&str, SqlParam)],
    ) -> DbResult<Vec<T>> {
        let mut query = SqlQuery::new(sql);
        for (name, param) in named {
            query = query.bind_named(name, param.clone());
        }

        let rows: Vec<T> = query.fetch_all(session.conn()).await?;
        Self::track_all(session, &rows);
        Ok(rows)
    }

    /// Lists rows windowed by `(offset, limit)`.
    pub async fn list_by_window(
        &self,
        session: &mut Session,
        sql: &str,
        offset: i64,
        limit: i64,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        let mut query = SqlQuery::new(sql).window(offset, limit);
        for param in params {
            query = query.bind(param.clone());
        }

        let rows: Vec<T> = query.fetch_all(session.conn()).await?;
        Self::track_all(session, &rows);
        Ok(rows)
    }

    /// Lists rows paged by `(page_size, page_number)`.
    ///
    /// `page_size == 0` disables pagination; other out-of-range inputs are
    /// silently coerced to the defaults (see `shopgrid_core::paging`).
    pub async fn list_paged(
        &self,
        session: &mut Session,
        sql: &str,
        page_size: i64,
        page_number: i64,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        debug!(
            sql = %sql,
            page_size = page_size,
            page_number = page_number,
            "paged query"
        );

        match page_window(page_size, page_number) {
            Some((offset, limit)) => {
                self.list_by_window(session, sql, offset, limit, params).await
            }
            None => self.list_by(session, sql, params).await,
        }
    }

    /// Executes a native write statement; reports the affected-row count.
    pub async fn execute_native(
        &self,
        session: &mut Session,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<u64> {
        let mut query = SqlQuery::new(sql);
        for param in params {
            query = query.bind(param.clone());
        }

        let result = query.execute(session.conn()).await?;
        Ok(result.rows_affected())
    }

    /// Returns the row with the highest identity value, or `None`.
    pub async fn last_record(&self, session: &mut Session) -> DbResult<Option<T>> {
        let last: Option<T> =
            SqlQuery::new(format!("SELECT * FROM {} ORDER BY id DESC", T::TABLE))
                .window(0, 1)
                .fetch_optional(session.conn())
                .await?;

        if let Some(entity) = &last {
            if let Some(id) = entity.id() {
                session.track::<T>(id);
            }
        }
        Ok(last)
    }

    /// Deletes a managed entity.
    ///
    /// Hard delete; association rows referencing the entity are not touched.
    /// `InvalidState` when the identity is not managed by this unit of work.
    pub async fn remove(&self, session: &mut Session, entity: &T) -> DbResult<()> {
        let id = entity.id().ok_or_else(|| {
            DbError::InvalidState(format!("cannot remove a {} that was never persisted", T::NAME))
        })?;

        if !session.contains::<T>(Some(id)) {
            return Err(DbError::InvalidState(format!(
                "cannot remove {} {}: not managed by this unit of work",
                T::NAME,
                id
            )));
        }

        SqlQuery::new(format!("DELETE FROM {} WHERE id = ?", T::TABLE))
            .bind(id)
            .execute(session.conn())
            .await?;
        session.untrack::<T>(id);

        debug!(entity = T::NAME, id = id, "removed");
        Ok(())
    }

    /// Reloads the entity's state from the store, overwriting in-memory
    /// changes. `NotFound` when the row has vanished.
    pub async fn refresh(&self, session: &mut Session, entity: &mut T) -> DbResult<()> {
        let id = entity.id().ok_or_else(|| {
            DbError::InvalidState(format!("cannot refresh a {} that was never persisted", T::NAME))
        })?;

        let fresh = self
            .find(session, id)
            .await?
            .ok_or_else(|| DbError::not_found(T::NAME, id))?;
        *entity = fresh;
        Ok(())
    }
}

// =============================================================================
// Writes and the Merge Engine
// =============================================================================

impl<T: Versioned> Dao<T> {
    /// Registers a new entity as managed.
    ///
    /// Assigns the generated id (when none was supplied), stamps version 0,
    /// and marks the identity managed. `DuplicateEntity` when the identity
    /// already exists.
    pub async fn persist(&self, session: &mut Session, entity: &mut T) -> DbResult<()> {
        if let Some(id) = entity.id() {
            if session.contains::<T>(Some(id)) {
                return Err(DbError::duplicate(T::NAME, id));
            }
            let existing =
                sqlx::query_scalar::<_, i64>(&format!("SELECT id FROM {} WHERE id = ?", T::TABLE))
                    .bind(id)
                    .fetch_optional(session.conn())
                    .await?;
            if existing.is_some() {
                return Err(DbError::duplicate(T::NAME, id));
            }
        }

        entity.touch();

        let mut columns: Vec<&str> = T::DATA_COLUMNS.to_vec();
        let mut values = entity.data_values();
        columns.push("version");
        values.push(SqlParam::Integer(0));
        if let Some(id) = entity.id() {
            columns.push("id");
            values.push(SqlParam::Integer(id));
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::TABLE,
            columns.join(", "),
            placeholders
        );

        let mut query = SqlQuery::new(sql);
        for value in values {
            query = query.bind(value);
        }
        let result = query.execute(session.conn()).await?;

        let id = match entity.id() {
            Some(id) => id,
            None => {
                let id = result.last_insert_rowid();
                entity.set_id(id);
                id
            }
        };
        entity.set_version(Some(0));
        session.track::<T>(id);

        debug!(entity = T::NAME, id = id, "persisted");
        Ok(())
    }

    /// Merges a detached entity using the version stamp the value itself
    /// carries. A value with no stamp at all falls through to the legacy
    /// unchecked path.
    pub async fn merge(&self, session: &mut Session, entity: &T) -> DbResult<T> {
        match entity.version() {
            Some(expected) => self.merge_with_version(session, entity, expected).await,
            None => self.merge_unchecked(session, entity).await,
        }
    }

    /// Merges a detached entity against the authoritative store copy,
    /// detecting lost updates with a caller-supplied expected stamp.
    ///
    /// The expected value replaces whatever stamp the detached value
    /// carried. An identity already managed by this unit of work is updated
    /// directly, without a stamp comparison.
    ///
    /// ## Errors
    /// - `ConcurrentModification` - stamp mismatch; another writer got there
    ///   first
    /// - `ConcurrencyLock` - the row was deleted between read and write
    pub async fn merge_with_version(
        &self,
        session: &mut Session,
        entity: &T,
        expected: i64,
    ) -> DbResult<T> {
        let id = Self::merge_id(entity)?;

        if session.contains::<T>(Some(id)) {
            return self.update_row(session, entity, id, None).await;
        }
        self.update_row(session, entity, id, Some(expected)).await
    }

    /// Merges without any concurrent-edit detection.
    ///
    /// Legacy path kept for callers that predate versioned merging; prefer
    /// [`Dao::merge_with_version`]. The stamp is still advanced so later
    /// checked merges see the write.
    pub async fn merge_unchecked(&self, session: &mut Session, entity: &T) -> DbResult<T> {
        let id = Self::merge_id(entity)?;
        self.update_row(session, entity, id, None).await
    }

    fn merge_id(entity: &T) -> DbResult<i64> {
        entity.id().ok_or_else(|| {
            DbError::InvalidState(format!("cannot merge a {} that was never persisted", T::NAME))
        })
    }

    /// Applies the update, advancing the stamp; `expected` arms the
    /// compare-and-swap.
    async fn update_row(
        &self,
        session: &mut Session,
        entity: &T,
        id: i64,
        expected: Option<i64>,
    ) -> DbResult<T> {
        let mut candidate = entity.clone();
        candidate.touch();

        let assignments = T::DATA_COLUMNS
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "UPDATE {} SET {}, version = version + 1 WHERE id = ?",
            T::TABLE,
            assignments
        );
        if expected.is_some() {
            sql.push_str(" AND version = ?");
        }

        let mut query = SqlQuery::new(sql);
        for value in candidate.data_values() {
            query = query.bind(value);
        }
        query = query.bind(id);
        if let Some(expected) = expected {
            query = query.bind(expected);
        }

        let result = query.execute(session.conn()).await?;
        if result.rows_affected() == 0 {
            let existing =
                sqlx::query_scalar::<_, i64>(&format!("SELECT id FROM {} WHERE id = ?", T::TABLE))
                    .bind(id)
                    .fetch_optional(session.conn())
                    .await?;

            return Err(match existing {
                None => DbError::ConcurrencyLock {
                    entity: T::NAME.to_string(),
                    id,
                },
                Some(_) if expected.is_some() => DbError::ConcurrentModification {
                    entity: T::NAME.to_string(),
                    id,
                },
                Some(_) => {
                    DbError::Internal(format!("update of {} {} affected no rows", T::NAME, id))
                }
            });
        }

        session.track::<T>(id);
        let merged = self
            .find(session, id)
            .await?
            .ok_or(DbError::ConcurrencyLock {
                entity: T::NAME.to_string(),
                id,
            })?;

        debug!(
            entity = T::NAME,
            id = id,
            version = ?merged.version(),
            checked = expected.is_some(),
            "merged"
        );
        Ok(merged)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
