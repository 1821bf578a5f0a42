//! # Point-of-Sale Repository
//!
//! Database operations for points of sale. The derived `in_use` flag on this
//! entity is written by the association repository's propagation logic, not
//! here.

use chrono::Utc;

use shopgrid_core::PointOfSale;

use crate::dao::{Dao, Entity, Versioned};
use crate::query::SqlParam;

impl Entity for PointOfSale {
    const NAME: &'static str = "PointOfSale";
    const TABLE: &'static str = "points_of_sale";
    const DATA_COLUMNS: &'static [&'static str] = &["name", "in_use", "updated_at"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn data_values(&self) -> Vec<SqlParam> {
        vec![
            self.name.as_str().into(),
            self.in_use.into(),
            self.updated_at.into(),
        ]
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for PointOfSale {
    fn version(&self) -> Option<i64> {
        self.version
    }

    fn set_version(&mut self, version: Option<i64>) {
        self.version = version;
    }
}

/// Repository for point-of-sale rows.
#[derive(Debug, Clone, Default)]
pub struct PointOfSaleRepository {
    dao: Dao<PointOfSale>,
}

impl PointOfSaleRepository {
    pub fn new() -> Self {
        PointOfSaleRepository { dao: Dao::new() }
    }

    /// The generic facade for this entity type.
    pub fn dao(&self) -> &Dao<PointOfSale> {
        &self.dao
    }
}
