//! # Query Executor
//!
//! Parameterized statement execution over the ambient transaction.
//!
//! ## Statement Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SqlQuery::new("SELECT * FROM categories WHERE in_use = ?")         │
//! │       │                                                             │
//! │       ├── .bind(true)              positional parameters            │
//! │       ├── .bind_named("id", 7)     or :name parameters              │
//! │       ├── .window(20, 10)          optional (offset, limit)         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  prepare(): named placeholders rewritten to `?`, window appended    │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  fetch_all / fetch_optional / execute on the session connection     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single-result request that finds no row returns `Ok(None)` - absence is
//! not an error at this layer.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
use sqlx::{FromRow, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::{DbError, DbResult};

// =============================================================================
// Parameters
// =============================================================================

/// A dynamically typed statement parameter.
///
/// The DAO facade composes SQL at runtime, so parameter values flow through
/// this enum instead of through compile-time checked bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Integer(value as i64)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Real(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Boolean(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(value: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => SqlParam::Null,
        }
    }
}

fn bind_query<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlParam],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(Option::<i64>::None),
            SqlParam::Integer(v) => query.bind(*v),
            SqlParam::Real(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::Boolean(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn bind_query_as<'q, T>(
    mut query: sqlx::query::QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    params: &[SqlParam],
) -> sqlx::query::QueryAs<'q, Sqlite, T, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(Option::<i64>::None),
            SqlParam::Integer(v) => query.bind(*v),
            SqlParam::Real(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::Boolean(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

// =============================================================================
// Named-Parameter Rewriting
// =============================================================================

/// Rewrites `:name` placeholders to positional `?` markers.
///
/// Placeholders are resolved left to right against `named`; the same name may
/// appear more than once. Text inside single-quoted string literals is left
/// untouched.
///
/// ## Errors
/// - `QueryFailed` when a placeholder has no bound value
/// - `QueryFailed` when a bound value is never referenced by the statement
pub(crate) fn rewrite_named(
    sql: &str,
    named: &[(String, SqlParam)],
) -> DbResult<(String, Vec<SqlParam>)> {
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();
    let mut used = vec![false; named.len()];
    let mut in_string = false;

    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            continue;
        }

        let starts_name = !in_string
            && c == ':'
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_');
        if !starts_name {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }

        let position = named.iter().position(|(key, _)| *key == name).ok_or_else(|| {
            DbError::QueryFailed(format!("no value bound for named parameter :{name}"))
        })?;
        used[position] = true;
        params.push(named[position].1.clone());
        out.push('?');
    }

    if let Some(unused) = used.iter().position(|u| !u) {
        return Err(DbError::QueryFailed(format!(
            "named parameter :{} is not referenced by the statement",
            named[unused].0
        )));
    }

    Ok((out, params))
}

// =============================================================================
// SqlQuery
// =============================================================================

/// A parameterized statement bound to positional or named values, optionally
/// windowed by `(offset, limit)`.
///
/// ## Example
/// ```rust,ignore
/// let texts: Vec<DefaultText> = SqlQuery::new("SELECT * FROM default_texts WHERE text = :text")
///     .bind_named("text", "weapons")
///     .fetch_all(session.conn())
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqlQuery {
    sql: String,
    params: Vec<SqlParam>,
    named: Vec<(String, SqlParam)>,
    window: Option<(i64, i64)>,
}

impl SqlQuery {
    /// Creates a query from a statement string.
    pub fn new(sql: impl Into<String>) -> Self {
        SqlQuery {
            sql: sql.into(),
            params: Vec::new(),
            named: Vec::new(),
            window: None,
        }
    }

    /// Binds the next positional parameter.
    pub fn bind(mut self, param: impl Into<SqlParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Binds a named parameter referenced as `:name` in the statement.
    pub fn bind_named(mut self, name: &str, param: impl Into<SqlParam>) -> Self {
        self.named.push((name.to_string(), param.into()));
        self
    }

    /// Windows the result set by `(offset, limit)`.
    pub fn window(mut self, offset: i64, limit: i64) -> Self {
        self.window = Some((offset, limit));
        self
    }

    /// Resolves named bindings and windowing into executable SQL.
    fn prepare(&self) -> DbResult<(String, Vec<SqlParam>)> {
        let (mut sql, mut params) = if self.named.is_empty() {
            (self.sql.clone(), self.params.clone())
        } else if self.params.is_empty() {
            rewrite_named(&self.sql, &self.named)?
        } else {
            return Err(DbError::QueryFailed(
                "statement mixes positional and named parameters".to_string(),
            ));
        };

        if let Some((offset, limit)) = self.window {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlParam::Integer(limit));
            params.push(SqlParam::Integer(offset));
        }

        Ok((sql, params))
    }

    /// Fetches every matching row.
    pub async fn fetch_all<T>(&self, conn: &mut SqliteConnection) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let (sql, params) = self.prepare()?;
        debug!(sql = %sql, params = params.len(), "fetching rows");

        let rows = bind_query_as(sqlx::query_as::<_, T>(&sql), &params)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    /// Fetches at most one row; no match is `Ok(None)`, never an error.
    pub async fn fetch_optional<T>(&self, conn: &mut SqliteConnection) -> DbResult<Option<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let (sql, params) = self.prepare()?;
        debug!(sql = %sql, params = params.len(), "fetching single row");

        let row = bind_query_as(sqlx::query_as::<_, T>(&sql), &params)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Executes a native write statement inside the ambient transaction and
    /// reports the affected rows (and, for inserts, the generated rowid).
    pub async fn execute(&self, conn: &mut SqliteConnection) -> DbResult<SqliteQueryResult> {
        let (sql, params) = self.prepare()?;
        debug!(sql = %sql, params = params.len(), "executing statement");

        let result = bind_query(sqlx::query(&sql), &params)
            .execute(&mut *conn)
            .await?;
        Ok(result)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
