//! Backing stores.
//!
//! A store owns its connections. Each [`TableStore::fetch`] call acquires one
//! session (a pooled PostgreSQL client or the SQLite connection guard), runs
//! one statement and releases the session before returning, whether the
//! statement succeeded or not.

pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use ub515_common::{DatabaseSettings, StoreBackend};

use crate::builder::{BuiltQuery, Dialect};
use crate::error::{QueryError, Result};
use crate::value::{RawValue, SqlValue};

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Column names and decoded cells of one statement, in store order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

#[async_trait]
pub trait TableStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    fn dialect(&self) -> Dialect;

    /// Schema that table references are qualified with, if any.
    fn schema(&self) -> Option<&str> {
        None
    }

    /// Run one statement with positional parameters in a fresh session.
    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<RawResultSet>;

    /// Like [`fetch`](Self::fetch) for caller-supplied statement text, which
    /// must not be kept in a per-session statement cache.
    async fn fetch_adhoc(&self, sql: &str, params: &[SqlValue]) -> Result<RawResultSet> {
        self.fetch(sql, params).await
    }

    /// Catalog query yielding a `table_name` column, sorted.
    fn tables_query(&self) -> BuiltQuery;

    /// Catalog query yielding `column_name`, `data_type` and
    /// `underlying_type` for `table`, in physical column order.
    fn columns_query(&self, table: &str) -> BuiltQuery;
}

/// Build the store selected by `settings.backend`.
pub fn connect(settings: &DatabaseSettings) -> Result<Arc<dyn TableStore>> {
    let missing = settings.missing_fields();
    if !missing.is_empty() {
        return Err(QueryError::Configuration(format!(
            "{} backend requires database.{}",
            settings.backend.as_str(),
            missing.join(", database.")
        )));
    }

    let store: Arc<dyn TableStore> = match settings.backend {
        StoreBackend::Postgres => Arc::new(PostgresStore::connect(settings)?),
        StoreBackend::Sqlite => {
            let path = settings.path.as_deref().unwrap_or_default();
            Arc::new(SqliteStore::open(path)?)
        }
    };
    Ok(store)
}
