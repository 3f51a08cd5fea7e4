use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use ub515_common::StoreBackend;

use super::{RawResultSet, TableStore};
use crate::builder::{BuiltQuery, Dialect};
use crate::error::{FailureKind, QueryError, Result};
use crate::value::{parse_duration, RawValue, SqlValue, Temporal};

/// How a column's declared type changes the reading of its storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Plain,
    Boolean,
    Date,
    DateTime,
    /// INTEGER cells are microseconds, REAL cells seconds
    Duration,
}

impl Affinity {
    fn from_decl(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return Affinity::Plain;
        };
        let decl = decl.to_ascii_uppercase();
        if decl.contains("INTERVAL") || decl.contains("DURATION") {
            Affinity::Duration
        } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
            Affinity::DateTime
        } else if decl == "DATE" {
            Affinity::Date
        } else if decl == "BOOLEAN" || decl == "BOOL" {
            Affinity::Boolean
        } else {
            Affinity::Plain
        }
    }
}

/// Single-connection SQLite store. The connection guard is the session.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`; `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QueryError::execution(
                        FailureKind::Connection,
                        format!("Failed to create directory for {}", path),
                        e,
                    )
                })?;
            }
            Connection::open(path)
        }
        .map_err(|e| {
            QueryError::execution(
                FailureKind::Connection,
                format!("Failed to open SQLite database {}", path),
                e,
            )
        })?;

        info!(path, "Opened SQLite store");
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements outside the read path (fixtures, seeding).
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute_batch(&sql).map_err(sqlite_error)
        })
        .await
        .map_err(join_error)?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| {
        QueryError::execution_msg(FailureKind::Connection, "SQLite connection lock poisoned")
    })
}

fn join_error(e: tokio::task::JoinError) -> QueryError {
    QueryError::execution(FailureKind::Other, "SQLite worker task failed", e)
}

fn sqlite_error(err: rusqlite::Error) -> QueryError {
    let kind = classify(&err);
    QueryError::execution(kind, err.to_string(), err)
}

fn classify(err: &rusqlite::Error) -> FailureKind {
    if let rusqlite::Error::SqliteFailure(e, _) = err {
        match e.code {
            rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::NotADatabase => {
                return FailureKind::Connection
            }
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                return FailureKind::Timeout
            }
            _ => {}
        }
    }
    if matches!(
        err,
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..)
    ) {
        return FailureKind::TypeMismatch;
    }

    let msg = err.to_string();
    if msg.contains("no such table") {
        FailureKind::UndefinedTable
    } else if msg.contains("no such column") {
        FailureKind::UndefinedColumn
    } else if msg.contains("syntax error") || msg.contains("incomplete input") {
        FailureKind::Syntax
    } else {
        FailureKind::Other
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            SqlValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Date(d) => ToSqlOutput::Owned(Value::Text(d.format("%Y-%m-%d").to_string())),
            SqlValue::Timestamp(ts) => ToSqlOutput::Owned(Value::Text(
                ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
        })
    }
}

fn decode(value: ValueRef<'_>, affinity: Affinity, column: &str) -> Result<RawValue> {
    Ok(match value {
        ValueRef::Null => RawValue::Null,
        ValueRef::Integer(i) => match affinity {
            Affinity::Duration => RawValue::Duration(i as f64 / 1_000_000.0),
            Affinity::Boolean => RawValue::Boolean(i != 0),
            _ => RawValue::Integer(i),
        },
        ValueRef::Real(f) => match affinity {
            Affinity::Duration => RawValue::Duration(f),
            _ => RawValue::Float(f),
        },
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                QueryError::execution(
                    FailureKind::TypeMismatch,
                    format!("Column '{}' holds invalid UTF-8", column),
                    e,
                )
            })?;
            decode_text(text, affinity)
        }
        ValueRef::Blob(_) => {
            return Err(QueryError::execution_msg(
                FailureKind::TypeMismatch,
                format!("Unsupported BLOB value in column '{}'", column),
            ))
        }
    })
}

fn decode_text(text: &str, affinity: Affinity) -> RawValue {
    let parsed = match affinity {
        Affinity::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|d| RawValue::Timestamp(Temporal::Date(d))),
        Affinity::DateTime => ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|dt| RawValue::Timestamp(Temporal::DateTime(dt))),
        Affinity::Duration => parse_duration(text).map(RawValue::Duration),
        Affinity::Boolean | Affinity::Plain => None,
    };
    parsed.unwrap_or_else(|| RawValue::Text(text.to_string()))
}

#[async_trait]
impl TableStore for SqliteStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<RawResultSet> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare(&sql).map_err(sqlite_error)?;

            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let affinities: Vec<Affinity> = stmt
                .columns()
                .iter()
                .map(|c| Affinity::from_decl(c.decl_type()))
                .collect();

            let mut rows = stmt
                .query(params_from_iter(params.iter()))
                .map_err(sqlite_error)?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(sqlite_error)? {
                let mut values = Vec::with_capacity(columns.len());
                for (idx, (name, affinity)) in columns.iter().zip(&affinities).enumerate() {
                    let value = row.get_ref(idx).map_err(sqlite_error)?;
                    values.push(decode(value, *affinity, name)?);
                }
                out.push(values);
            }

            Ok(RawResultSet { columns, rows: out })
        })
        .await
        .map_err(join_error)?
    }

    fn tables_query(&self) -> BuiltQuery {
        BuiltQuery::new(
            "SELECT name AS table_name FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
            Vec::new(),
        )
    }

    fn columns_query(&self, table: &str) -> BuiltQuery {
        BuiltQuery::new(
            "SELECT name AS column_name, lower(type) AS data_type, type AS underlying_type \
             FROM pragma_table_info(?1) ORDER BY cid",
            vec![SqlValue::Text(table.to_string())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_from_decl() {
        assert_eq!(Affinity::from_decl(Some("INTERVAL")), Affinity::Duration);
        assert_eq!(Affinity::from_decl(Some("duration_us")), Affinity::Duration);
        assert_eq!(Affinity::from_decl(Some("date")), Affinity::Date);
        assert_eq!(Affinity::from_decl(Some("DATETIME")), Affinity::DateTime);
        assert_eq!(Affinity::from_decl(Some("boolean")), Affinity::Boolean);
        assert_eq!(Affinity::from_decl(Some("VARCHAR(50)")), Affinity::Plain);
        assert_eq!(Affinity::from_decl(None), Affinity::Plain);
    }

    #[test]
    fn test_decode_duration_storage_classes() {
        assert_eq!(
            decode(ValueRef::Integer(5_025_500_000), Affinity::Duration, "overall").unwrap(),
            RawValue::Duration(5025.5)
        );
        assert_eq!(
            decode(ValueRef::Real(90000.0), Affinity::Duration, "overall").unwrap(),
            RawValue::Duration(90000.0)
        );
        assert_eq!(
            decode(ValueRef::Text(b"1:23:45.5"), Affinity::Duration, "overall").unwrap(),
            RawValue::Duration(5025.5)
        );
        assert_eq!(
            decode(ValueRef::Text(b"DNF"), Affinity::Duration, "overall").unwrap(),
            RawValue::Text("DNF".into())
        );
    }

    #[test]
    fn test_decode_blob_is_rejected() {
        let err = decode(ValueRef::Blob(&[0, 1]), Affinity::Plain, "photo").unwrap_err();
        assert!(err.is_query_execution());
    }

    #[tokio::test]
    async fn test_fetch_binds_positional_params() {
        let store = SqliteStore::open(":memory:").unwrap();
        store
            .execute_batch(
                "CREATE TABLE t (id INTEGER, name TEXT);
                 INSERT INTO t VALUES (1, 'a'), (2, 'b'), (3, 'c');",
            )
            .await
            .unwrap();

        let rs = store
            .fetch(
                "SELECT id, name FROM t WHERE id >= ?1 ORDER BY id LIMIT ?2",
                &[SqlValue::Int(2), SqlValue::Int(5)],
            )
            .await
            .unwrap();
        assert_eq!(rs.columns, vec!["id", "name"]);
        assert_eq!(
            rs.rows,
            vec![
                vec![RawValue::Integer(2), RawValue::Text("b".into())],
                vec![RawValue::Integer(3), RawValue::Text("c".into())],
            ]
        );
    }

    #[tokio::test]
    async fn test_error_releases_connection() {
        let store = SqliteStore::open(":memory:").unwrap();
        let err = store.fetch("SELECT * FROM missing", &[]).await.unwrap_err();
        match err {
            QueryError::QueryExecution { kind, .. } => {
                assert_eq!(kind, FailureKind::UndefinedTable)
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = store.fetch("SELEC 1", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::QueryExecution {
                kind: FailureKind::Syntax,
                ..
            }
        ));

        // the guard from the failed calls is gone
        let rs = store.fetch("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(rs.rows, vec![vec![RawValue::Integer(1)]]);
    }
}
