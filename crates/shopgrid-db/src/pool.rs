//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  startup                                                            │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  DbConfig::new(path) ──► Database::new(config).await                │
//! │                             │  pool + migrations                    │
//! │                             ▼                                       │
//! │  per request: db.begin() ──► Session (one unit of work)             │
//! │                             │                                       │
//! │                             ▼                                       │
//! │  repositories / DAO facade join the session's transaction           │
//! │                             │                                       │
//! │                             ▼                                       │
//! │  session.commit()  (or drop to roll back)                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WAL mode is enabled so readers and writers do not block each other;
//! foreign keys are switched on (SQLite default-off).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::category::CategoryRepository;
use crate::repository::default_text::DefaultTextRepository;
use crate::repository::point_of_sale::PointOfSaleRepository;
use crate::repository::pos_category::PosCategoryRepository;
use crate::session::Session;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/shopgrid/shopgrid.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration with the given database path. The file is
    /// created if it does not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// In-memory databases are per-connection, so the pool is pinned to a
    /// single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing sessions and repository access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./shopgrid.db")).await?;
///
/// let mut session = db.begin().await?;
/// db.pos_categories().link(&mut session, category_id, pos_id).await?;
/// session.commit().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates the connection pool and, when configured, runs migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // WAL: readers do not block writers and vice versa
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite ships with foreign keys off
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Begins a unit of work. The caller decides when to commit; dropping
    /// the session rolls it back.
    pub async fn begin(&self) -> DbResult<Session> {
        let tx = self.pool.begin().await?;
        Ok(Session::new(tx))
    }

    /// Returns a reference to the connection pool, for statements that do
    /// not belong to any unit of work (diagnostics, maintenance).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the default-text repository.
    pub fn default_texts(&self) -> DefaultTextRepository {
        DefaultTextRepository::new()
    }

    /// Returns the category repository.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new()
    }

    /// Returns the point-of-sale repository.
    pub fn points_of_sale(&self) -> PointOfSaleRepository {
        PointOfSaleRepository::new()
    }

    /// Returns the association repository maintaining the in-use flag.
    pub fn pos_categories(&self) -> PosCategoryRepository {
        PosCategoryRepository::new()
    }

    /// Closes the connection pool. Subsequent operations fail with
    /// `InvalidState`.
    pub async fn close(&self) {
        info!("closing database connection pool");
        self.pool.close().await;
    }

    /// Checks whether the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/shopgrid-test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }

    #[tokio::test]
    async fn test_committed_work_is_visible_to_later_sessions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut session = db.begin().await.unwrap();
        sqlx::query("INSERT INTO points_of_sale (name, updated_at) VALUES ('kiosk', '2024-01-01')")
            .execute(session.conn())
            .await
            .unwrap();
        session.commit().await.unwrap();

        let mut session = db.begin().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points_of_sale")
            .fetch_one(session.conn())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
