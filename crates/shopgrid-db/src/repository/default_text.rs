//! # Default-Text Repository
//!
//! Database operations for the default-locale texts referenced by
//! categories.

use chrono::Utc;

use shopgrid_core::DefaultText;

use crate::dao::{Dao, Entity, Versioned};
use crate::error::DbResult;
use crate::query::SqlParam;
use crate::session::Session;

impl Entity for DefaultText {
    const NAME: &'static str = "DefaultText";
    const TABLE: &'static str = "default_texts";
    const DATA_COLUMNS: &'static [&'static str] = &["text", "updated_at"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn data_values(&self) -> Vec<SqlParam> {
        vec![self.text.as_str().into(), self.updated_at.into()]
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for DefaultText {
    fn version(&self) -> Option<i64> {
        self.version
    }

    fn set_version(&mut self, version: Option<i64>) {
        self.version = version;
    }
}

/// Repository for default-text rows.
#[derive(Debug, Clone, Default)]
pub struct DefaultTextRepository {
    dao: Dao<DefaultText>,
}

impl DefaultTextRepository {
    pub fn new() -> Self {
        DefaultTextRepository { dao: Dao::new() }
    }

    /// The generic facade for this entity type.
    pub fn dao(&self) -> &Dao<DefaultText> {
        &self.dao
    }

    /// Resolves a text row by its content.
    pub async fn find_by_text(
        &self,
        session: &mut Session,
        text: &str,
    ) -> DbResult<Option<DefaultText>> {
        self.dao.find_by_field(session, "text", text).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
