//! # Category Repository
//!
//! Database operations for categories, including the ordered category set
//! of one point of sale.

use chrono::Utc;

use shopgrid_core::Category;

use crate::dao::{Dao, Entity, Versioned};
use crate::error::DbResult;
use crate::query::SqlParam;
use crate::session::Session;

/// Categories linked to one point of sale, in link order.
const CATEGORIES_FOR_POINT_OF_SALE: &str = "SELECT c.* FROM categories c \
     JOIN point_of_sale_categories l ON l.category_id = c.id \
     WHERE l.point_of_sale_id = ? \
     ORDER BY l.position";

impl Entity for Category {
    const NAME: &'static str = "Category";
    const TABLE: &'static str = "categories";
    const DATA_COLUMNS: &'static [&'static str] =
        &["name_id", "description_id", "in_use", "updated_at"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn data_values(&self) -> Vec<SqlParam> {
        vec![
            self.name_id.into(),
            self.description_id.into(),
            self.in_use.into(),
            self.updated_at.into(),
        ]
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for Category {
    fn version(&self) -> Option<i64> {
        self.version
    }

    fn set_version(&mut self, version: Option<i64>) {
        self.version = version;
    }
}

/// Repository for category rows.
#[derive(Debug, Clone, Default)]
pub struct CategoryRepository {
    dao: Dao<Category>,
}

impl CategoryRepository {
    pub fn new() -> Self {
        CategoryRepository { dao: Dao::new() }
    }

    /// The generic facade for this entity type.
    pub fn dao(&self) -> &Dao<Category> {
        &self.dao
    }

    /// Categories linked to the given point of sale, ordered by the link's
    /// `position` attribute. Empty when the point of sale has no links (or
    /// does not exist).
    pub async fn categories_for_point_of_sale(
        &self,
        session: &mut Session,
        point_of_sale_id: i64,
    ) -> DbResult<Vec<Category>> {
        self.dao
            .list_by(
                session,
                CATEGORIES_FOR_POINT_OF_SALE,
                &[point_of_sale_id.into()],
            )
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use shopgrid_core::{PointOfSale, PosCategoryLink};

    #[tokio::test]
    async fn test_categories_for_point_of_sale_follow_link_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let categories = db.categories();
        let mut session = db.begin().await.unwrap();

        let mut pos = PointOfSale::new("web store");
        db.points_of_sale()
            .dao()
            .persist(&mut session, &mut pos)
            .await
            .unwrap();
        let pos_id = pos.id.unwrap();

        let mut first = Category::new();
        let mut second = Category::new();
        categories.dao().persist(&mut session, &mut first).await.unwrap();
        categories.dao().persist(&mut session, &mut second).await.unwrap();

        // Link `second` ahead of `first` via the position attribute
        let links: Dao<PosCategoryLink> = Dao::new();
        let mut link_first = PosCategoryLink::new(pos_id, first.id.unwrap());
        link_first.position = 2;
        let mut link_second = PosCategoryLink::new(pos_id, second.id.unwrap());
        link_second.position = 1;
        links.persist(&mut session, &mut link_first).await.unwrap();
        links.persist(&mut session, &mut link_second).await.unwrap();

        let ordered = categories
            .categories_for_point_of_sale(&mut session, pos_id)
            .await
            .unwrap();
        assert_eq!(ordered, vec![second, first]);
    }
}
