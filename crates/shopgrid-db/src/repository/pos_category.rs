//! # Point-of-Sale / Category Association Repository
//!
//! Association rows between points of sale and categories, and the logic
//! that keeps the derived `in_use` flag on points of sale consistent with
//! the categories reachable through those rows.
//!
//! ## Flag Maintenance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  link(category, pos)                                                    │
//! │     category.in_use == true  ──► pos.in_use = true                      │
//! │     (adding a link can only turn the flag ON, never off)                │
//! │                                                                         │
//! │  propagate_in_use(category)          after false -> true on the member  │
//! │     for every link of the category:                                     │
//! │         pos.in_use == false ──► pos.in_use = true                       │
//! │                                                                         │
//! │  propagate_out_of_use(category)      after true -> false on the member  │
//! │     for every link of the category:                                     │
//! │         rescan ALL categories of that pos                               │
//! │         none in use AND pos.in_use ──► pos.in_use = false               │
//! │     (a single removed row never proves the pos is idle)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flag is a materialized aggregate over the association graph. Callers
//! must invoke the matching propagation operation after every category flag
//! change; between the flag write and the propagation call the aggregate is
//! stale. Propagation joins the caller's ambient transaction and takes no
//! cross-row lock, so under concurrent writers the invariant is eventually
//! consistent once all propagation calls have completed.

use chrono::Utc;
use tracing::debug;

use shopgrid_core::{Category, PointOfSale, PosCategoryLink};

use crate::dao::{Dao, Entity, Versioned};
use crate::error::{DbError, DbResult};
use crate::query::SqlParam;
use crate::session::Session;

const LINKS_FOR_POINT_OF_SALE: &str =
    "SELECT * FROM point_of_sale_categories WHERE point_of_sale_id = :point_of_sale_id";

const LINKS_FOR_CATEGORY: &str =
    "SELECT * FROM point_of_sale_categories WHERE category_id = :category_id";

const LINK_FOR_PAIR: &str = "SELECT * FROM point_of_sale_categories \
     WHERE point_of_sale_id = :point_of_sale_id AND category_id = :category_id";

/// Categories reachable from one point of sale, in link order.
const CATEGORY_TREE: &str = "SELECT c.* FROM point_of_sale_categories l \
     JOIN categories c ON c.id = l.category_id \
     WHERE l.point_of_sale_id = :point_of_sale_id \
     ORDER BY l.position";

impl Entity for PosCategoryLink {
    const NAME: &'static str = "PosCategoryLink";
    const TABLE: &'static str = "point_of_sale_categories";
    const DATA_COLUMNS: &'static [&'static str] =
        &["point_of_sale_id", "category_id", "position", "updated_at"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn data_values(&self) -> Vec<SqlParam> {
        vec![
            self.point_of_sale_id.into(),
            self.category_id.into(),
            self.position.into(),
            self.updated_at.into(),
        ]
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for PosCategoryLink {
    fn version(&self) -> Option<i64> {
        self.version
    }

    fn set_version(&mut self, version: Option<i64>) {
        self.version = version;
    }
}

/// Repository for association rows, and maintainer of the derived `in_use`
/// flag on points of sale.
#[derive(Debug, Clone, Default)]
pub struct PosCategoryRepository {
    links: Dao<PosCategoryLink>,
    categories: Dao<Category>,
    points_of_sale: Dao<PointOfSale>,
}

impl PosCategoryRepository {
    pub fn new() -> Self {
        PosCategoryRepository {
            links: Dao::new(),
            categories: Dao::new(),
            points_of_sale: Dao::new(),
        }
    }

    /// The generic facade for association rows.
    pub fn dao(&self) -> &Dao<PosCategoryLink> {
        &self.links
    }

    /// Association rows of one point of sale.
    pub async fn links_for_point_of_sale(
        &self,
        session: &mut Session,
        point_of_sale_id: i64,
    ) -> DbResult<Vec<PosCategoryLink>> {
        self.links
            .list_by_named(
                session,
                LINKS_FOR_POINT_OF_SALE,
                &[("point_of_sale_id", point_of_sale_id.into())],
            )
            .await
    }

    /// Association rows referencing one category.
    pub async fn links_for_category(
        &self,
        session: &mut Session,
        category_id: i64,
    ) -> DbResult<Vec<PosCategoryLink>> {
        self.links
            .list_by_named(
                session,
                LINKS_FOR_CATEGORY,
                &[("category_id", category_id.into())],
            )
            .await
    }

    /// The association row for one `(category, point of sale)` pair, or
    /// `None`.
    pub async fn link_for(
        &self,
        session: &mut Session,
        category_id: i64,
        point_of_sale_id: i64,
    ) -> DbResult<Option<PosCategoryLink>> {
        let rows = self
            .links
            .list_by_named(
                session,
                LINK_FOR_PAIR,
                &[
                    ("point_of_sale_id", point_of_sale_id.into()),
                    ("category_id", category_id.into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Categories reachable from one point of sale, in link order.
    pub async fn category_tree(
        &self,
        session: &mut Session,
        point_of_sale_id: i64,
    ) -> DbResult<Vec<Category>> {
        self.categories
            .list_by_named(
                session,
                CATEGORY_TREE,
                &[("point_of_sale_id", point_of_sale_id.into())],
            )
            .await
    }

    /// Creates an association row between an existing category and an
    /// existing point of sale.
    ///
    /// When the category's flag is already on, the point of sale's flag is
    /// turned on as well. Adding a link can only turn the flag on, never
    /// off.
    pub async fn link(
        &self,
        session: &mut Session,
        category_id: i64,
        point_of_sale_id: i64,
    ) -> DbResult<PosCategoryLink> {
        let category = self
            .categories
            .find(session, category_id)
            .await?
            .ok_or_else(|| DbError::not_found(Category::NAME, category_id))?;
        let point_of_sale = self
            .points_of_sale
            .find(session, point_of_sale_id)
            .await?
            .ok_or_else(|| DbError::not_found(PointOfSale::NAME, point_of_sale_id))?;

        let mut link = PosCategoryLink::new(point_of_sale_id, category_id);
        self.links.persist(session, &mut link).await?;

        if category.in_use {
            let mut point_of_sale = point_of_sale;
            point_of_sale.in_use = true;
            self.points_of_sale.merge(session, &point_of_sale).await?;
        }

        debug!(
            category = category_id,
            point_of_sale = point_of_sale_id,
            "linked"
        );
        Ok(link)
    }

    /// Removes the association row between a category and a point of sale,
    /// when one exists. The referenced entities are never removed.
    pub async fn unlink(
        &self,
        session: &mut Session,
        category_id: i64,
        point_of_sale_id: i64,
    ) -> DbResult<()> {
        if let Some(link) = self.link_for(session, category_id, point_of_sale_id).await? {
            self.links.remove(session, &link).await?;
        }
        Ok(())
    }

    /// Called after a category's flag transitions false -> true: every
    /// point of sale linked to it whose flag is off is turned on.
    pub async fn propagate_in_use(
        &self,
        session: &mut Session,
        category_id: i64,
    ) -> DbResult<()> {
        let links = self.links_for_category(session, category_id).await?;
        debug!(
            category = category_id,
            links = links.len(),
            "propagating in-use"
        );

        for link in links {
            let mut point_of_sale = self
                .points_of_sale
                .find(session, link.point_of_sale_id)
                .await?
                .ok_or_else(|| DbError::not_found(PointOfSale::NAME, link.point_of_sale_id))?;

            if !point_of_sale.in_use {
                point_of_sale.in_use = true;
                self.points_of_sale.merge(session, &point_of_sale).await?;
            }
        }
        Ok(())
    }

    /// Called after a category's flag transitions true -> false: for every
    /// point of sale linked to it, the flag is re-derived from all of that
    /// point of sale's categories and turned off only when none is in use.
    pub async fn propagate_out_of_use(
        &self,
        session: &mut Session,
        category_id: i64,
    ) -> DbResult<()> {
        let links = self.links_for_category(session, category_id).await?;
        debug!(
            category = category_id,
            links = links.len(),
            "propagating out-of-use"
        );

        for link in links {
            let mut point_of_sale = self
                .points_of_sale
                .find(session, link.point_of_sale_id)
                .await?
                .ok_or_else(|| DbError::not_found(PointOfSale::NAME, link.point_of_sale_id))?;

            let categories = self.category_tree(session, link.point_of_sale_id).await?;
            let any_in_use = categories.iter().any(|category| category.in_use);

            // One deactivated member proves nothing; only the full scan may
            // turn the flag off.
            if !any_in_use && point_of_sale.in_use {
                point_of_sale.in_use = false;
                self.points_of_sale.merge(session, &point_of_sale).await?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    struct Fixture {
        db: Database,
    }

    impl Fixture {
        async fn new() -> Self {
            Fixture {
                db: Database::new(DbConfig::in_memory()).await.unwrap(),
            }
        }

        fn repo(&self) -> PosCategoryRepository {
            self.db.pos_categories()
        }

        async fn category(&self, session: &mut Session, in_use: bool) -> i64 {
            let mut category = Category::new();
            category.in_use = in_use;
            self.db
                .categories()
                .dao()
                .persist(session, &mut category)
                .await
                .unwrap();
            category.id.unwrap()
        }

        async fn point_of_sale(&self, session: &mut Session, name: &str) -> i64 {
            let mut pos = PointOfSale::new(name);
            self.db
                .points_of_sale()
                .dao()
                .persist(session, &mut pos)
                .await
                .unwrap();
            pos.id.unwrap()
        }

        async fn pos_in_use(&self, session: &mut Session, id: i64) -> bool {
            self.db
                .points_of_sale()
                .dao()
                .find(session, id)
                .await
                .unwrap()
                .unwrap()
                .in_use
        }

        async fn set_category_in_use(&self, session: &mut Session, id: i64, in_use: bool) {
            let dao = self.db.categories().dao().clone();
            let mut category = dao.find(session, id).await.unwrap().unwrap();
            category.in_use = in_use;
            dao.merge(session, &category).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_link_with_active_category_turns_pos_on() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, true).await;
        let pos = fx.point_of_sale(&mut session, "web store").await;
        assert!(!fx.pos_in_use(&mut session, pos).await);

        repo.link(&mut session, category, pos).await.unwrap();
        assert!(fx.pos_in_use(&mut session, pos).await);
    }

    #[tokio::test]
    async fn test_link_with_inactive_category_leaves_pos_off() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, false).await;
        let pos = fx.point_of_sale(&mut session, "web store").await;

        repo.link(&mut session, category, pos).await.unwrap();
        assert!(!fx.pos_in_use(&mut session, pos).await);
    }

    #[tokio::test]
    async fn test_link_requires_both_ends() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, false).await;
        let err = repo.link(&mut session, category, 9999).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let pos = fx.point_of_sale(&mut session, "web store").await;
        let err = repo.link(&mut session, 9999, pos).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_propagate_in_use_turns_linked_pos_on() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, false).await;
        let web = fx.point_of_sale(&mut session, "web store").await;
        let game = fx.point_of_sale(&mut session, "in-game store").await;
        repo.link(&mut session, category, web).await.unwrap();
        repo.link(&mut session, category, game).await.unwrap();

        fx.set_category_in_use(&mut session, category, true).await;
        repo.propagate_in_use(&mut session, category).await.unwrap();

        assert!(fx.pos_in_use(&mut session, web).await);
        assert!(fx.pos_in_use(&mut session, game).await);
    }

    #[tokio::test]
    async fn test_propagate_out_of_use_rederives_from_all_members() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let first = fx.category(&mut session, true).await;
        let second = fx.category(&mut session, true).await;
        let pos = fx.point_of_sale(&mut session, "web store").await;
        repo.link(&mut session, first, pos).await.unwrap();
        repo.link(&mut session, second, pos).await.unwrap();
        assert!(fx.pos_in_use(&mut session, pos).await);

        // `second` is still in use, so the flag must survive
        fx.set_category_in_use(&mut session, first, false).await;
        repo.propagate_out_of_use(&mut session, first).await.unwrap();
        assert!(fx.pos_in_use(&mut session, pos).await);

        // Now no member is in use
        fx.set_category_in_use(&mut session, second, false).await;
        repo.propagate_out_of_use(&mut session, second).await.unwrap();
        assert!(!fx.pos_in_use(&mut session, pos).await);
    }

    #[tokio::test]
    async fn test_flag_is_stale_until_propagation_runs() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, true).await;
        let pos = fx.point_of_sale(&mut session, "web store").await;
        repo.link(&mut session, category, pos).await.unwrap();
        assert!(fx.pos_in_use(&mut session, pos).await);

        // The aggregate is maintained by explicit propagation calls only:
        // after the member flag flips, the container flag is stale until
        // propagate_out_of_use runs. This window is part of the contract.
        fx.set_category_in_use(&mut session, category, false).await;
        assert!(fx.pos_in_use(&mut session, pos).await);

        repo.propagate_out_of_use(&mut session, category)
            .await
            .unwrap();
        assert!(!fx.pos_in_use(&mut session, pos).await);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        // Category A (inactive), point of sale P (off), linked: P stays off
        let a = fx.category(&mut session, false).await;
        let p = fx.point_of_sale(&mut session, "web store").await;
        repo.link(&mut session, a, p).await.unwrap();
        assert!(!fx.pos_in_use(&mut session, p).await);

        // A goes active, propagation turns P on
        fx.set_category_in_use(&mut session, a, true).await;
        repo.propagate_in_use(&mut session, a).await.unwrap();
        assert!(fx.pos_in_use(&mut session, p).await);

        // Inactive B joins; A goes inactive again: B cannot hold the flag up
        let b = fx.category(&mut session, false).await;
        repo.link(&mut session, b, p).await.unwrap();
        fx.set_category_in_use(&mut session, a, false).await;
        repo.propagate_out_of_use(&mut session, a).await.unwrap();
        assert!(!fx.pos_in_use(&mut session, p).await);
    }

    #[tokio::test]
    async fn test_unlink_removes_the_row_but_not_the_entities() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, false).await;
        let pos = fx.point_of_sale(&mut session, "web store").await;
        repo.link(&mut session, category, pos).await.unwrap();
        assert!(repo
            .link_for(&mut session, category, pos)
            .await
            .unwrap()
            .is_some());

        repo.unlink(&mut session, category, pos).await.unwrap();
        assert!(repo
            .link_for(&mut session, category, pos)
            .await
            .unwrap()
            .is_none());

        // Unlinking an absent pair is a no-op
        repo.unlink(&mut session, category, pos).await.unwrap();

        // Both entities survive
        assert!(fx
            .db
            .categories()
            .dao()
            .find(&mut session, category)
            .await
            .unwrap()
            .is_some());
        assert!(fx
            .db
            .points_of_sale()
            .dao()
            .find(&mut session, pos)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_link_queries() {
        let fx = Fixture::new().await;
        let repo = fx.repo();
        let mut session = fx.db.begin().await.unwrap();

        let category = fx.category(&mut session, false).await;
        let other = fx.category(&mut session, false).await;
        let pos = fx.point_of_sale(&mut session, "web store").await;
        repo.link(&mut session, category, pos).await.unwrap();
        repo.link(&mut session, other, pos).await.unwrap();

        let by_pos = repo
            .links_for_point_of_sale(&mut session, pos)
            .await
            .unwrap();
        assert_eq!(by_pos.len(), 2);

        let by_category = repo.links_for_category(&mut session, category).await.unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].category_id, category);

        let tree = repo.category_tree(&mut session, pos).await.unwrap();
        assert_eq!(tree.len(), 2);
    }
}
