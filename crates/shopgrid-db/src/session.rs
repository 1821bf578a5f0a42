//! # Unit-of-Work Session
//!
//! One [`Session`] is one logical unit of work: a transaction on the store
//! plus the set of entity identities managed inside it.
//!
//! ## Ownership Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  request handler                                                    │
//! │     │ db.begin()                                                    │
//! │     ▼                                                               │
//! │  Session ──── owns ────► Transaction ────► SQLite connection        │
//! │     │                                                               │
//! │     ├── identity map: (table, id) pairs managed in this unit        │
//! │     │   of work; find/persist/merge mark, remove/detach unmark      │
//! │     │                                                               │
//! │     ├── commit()    flush and end the unit of work                  │
//! │     └── drop        roll back (uncommitted work is discarded)       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The facade never opens or closes transactions itself; the surrounding
//! request handler begins the session and decides when to commit. Entities
//! returned to callers across a commit boundary are detached values; they
//! must be merged back through the DAO before they affect stored state.

use std::collections::HashSet;

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use crate::dao::Entity;
use crate::error::DbResult;

/// Identity of one managed entity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntityKey {
    table: &'static str,
    id: i64,
}

/// A unit of work: ambient transaction plus identity tracking.
pub struct Session {
    tx: Transaction<'static, Sqlite>,
    tracked: HashSet<EntityKey>,
}

impl Session {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Session {
            tx,
            tracked: HashSet::new(),
        }
    }

    /// The transaction's connection; every statement issued through it joins
    /// the ambient transaction.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Whether the identity is managed in this unit of work.
    ///
    /// `None` ids (never-persisted entities) are never managed.
    pub fn contains<T: Entity>(&self, id: Option<i64>) -> bool {
        match id {
            Some(id) => self.tracked.contains(&EntityKey {
                table: T::TABLE,
                id,
            }),
            None => false,
        }
    }

    /// Detaches one entity from the unit of work. Its row is untouched;
    /// the instance just stops counting as managed.
    pub fn detach<T: Entity>(&mut self, entity: &T) {
        if let Some(id) = entity.id() {
            self.untrack::<T>(id);
        }
    }

    /// Detaches every managed entity.
    pub fn clear(&mut self) {
        self.tracked.clear();
    }

    pub(crate) fn track<T: Entity>(&mut self, id: i64) {
        self.tracked.insert(EntityKey {
            table: T::TABLE,
            id,
        });
    }

    pub(crate) fn untrack<T: Entity>(&mut self, id: i64) {
        self.tracked.remove(&EntityKey {
            table: T::TABLE,
            id,
        });
    }

    /// Commits the unit of work.
    pub async fn commit(self) -> DbResult<()> {
        debug!(managed = self.tracked.len(), "committing unit of work");
        self.tx.commit().await?;
        Ok(())
    }

    /// Rolls the unit of work back explicitly. Dropping the session has the
    /// same effect.
    pub async fn rollback(self) -> DbResult<()> {
        debug!("rolling back unit of work");
        self.tx.rollback().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
