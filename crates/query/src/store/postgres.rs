//! PostgreSQL store backed by a `deadpool-postgres` pool.
//!
//! Statements are prepared first so each bound value can be converted to the
//! type the server inferred for its placeholder. Cells are decoded by column
//! type; `interval` cells become [`RawValue::Duration`]. Generated and
//! catalog statements go through the per-connection statement cache;
//! caller-supplied text is prepared uncached.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod};
use postgres_types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::error::Error as StdError;
use std::str::FromStr;
use tokio_postgres::{Client, NoTls, Row, Statement};
use tracing::info;
use ub515_common::{DatabaseSettings, StoreBackend};

use super::{RawResultSet, TableStore};
use crate::builder::{BuiltQuery, Dialect};
use crate::error::{FailureKind, QueryError, Result};
use crate::identifier::{validate_identifier, IdentifierKind};
use crate::value::{parse_duration, RawValue, SqlValue, Temporal};

type BoxError = Box<dyn StdError + Sync + Send>;

const MICROS_PER_SECOND: f64 = 1_000_000.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// `interval` months are counted as 30 days, as PostgreSQL's own
/// `EXTRACT(EPOCH FROM ...)` does.
const DAYS_PER_MONTH: f64 = 30.0;

pub struct PostgresStore {
    pool: Pool,
    schema: String,
}

impl PostgresStore {
    /// Create the pool. No connection is opened until the first query.
    pub fn connect(settings: &DatabaseSettings) -> Result<Self> {
        validate_identifier(IdentifierKind::Table, &settings.schema).map_err(|_| {
            QueryError::Configuration(format!("Invalid database.schema '{}'", settings.schema))
        })?;

        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = settings.host.clone();
        cfg.port = Some(settings.port);
        cfg.user = settings.user.clone();
        cfg.password = settings.password().map(str::to_string);
        cfg.dbname = settings.name.clone();
        cfg.application_name = Some("ub515".to_string());
        cfg.pool = Some(PoolConfig::new(settings.pool_size));
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(None, NoTls).map_err(|e| {
            QueryError::Configuration(format!("Failed to create database pool: {}", e))
        })?;

        info!(
            url = %settings.redacted_url(),
            pool_size = settings.pool_size,
            schema = %settings.schema,
            "Created PostgreSQL pool"
        );

        Ok(Self {
            pool,
            schema: settings.schema.clone(),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn pg_error(err: tokio_postgres::Error) -> QueryError {
    let (kind, sqlstate, message) = match err.as_db_error() {
        Some(db) => {
            let code = db.code().code().to_string();
            let message = match db.detail() {
                Some(detail) => format!("{} ({})", db.message(), detail),
                None => db.message().to_string(),
            };
            (FailureKind::from_sqlstate(&code), Some(code), message)
        }
        None if err.is_closed() => (FailureKind::Connection, None, err.to_string()),
        None => (FailureKind::Other, None, err.to_string()),
    };
    QueryError::QueryExecution {
        message,
        kind,
        sqlstate,
        source: Some(Box::new(err)),
    }
}

fn pool_error(err: PoolError) -> QueryError {
    match err {
        PoolError::Backend(e) => {
            let mut converted = pg_error(e);
            if let QueryError::QueryExecution { kind, .. } = &mut converted {
                if *kind == FailureKind::Other {
                    *kind = FailureKind::Connection;
                }
            }
            converted
        }
        PoolError::Timeout(_) | PoolError::Closed => QueryError::execution(
            FailureKind::PoolExhausted,
            "No PostgreSQL connection available",
            err,
        ),
        other => QueryError::execution(
            FailureKind::Connection,
            "Failed to acquire a PostgreSQL connection",
            other,
        ),
    }
}

/// `interval` in its wire layout: microseconds, days, months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgInterval {
    pub micros: i64,
    pub days: i32,
    pub months: i32,
}

impl PgInterval {
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            micros: (seconds * MICROS_PER_SECOND).round() as i64,
            days: 0,
            months: 0,
        }
    }

    pub fn as_seconds(&self) -> f64 {
        self.micros as f64 / MICROS_PER_SECOND
            + (f64::from(self.days) + f64::from(self.months) * DAYS_PER_MONTH) * SECONDS_PER_DAY
    }
}

impl<'a> FromSql<'a> for PgInterval {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        if raw.len() != 16 {
            return Err(format!("invalid interval length {}", raw.len()).into());
        }
        Ok(Self {
            micros: i64::from_be_bytes(<[u8; 8]>::try_from(&raw[0..8])?),
            days: i32::from_be_bytes(<[u8; 4]>::try_from(&raw[8..12])?),
            months: i32::from_be_bytes(<[u8; 4]>::try_from(&raw[12..16])?),
        })
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

impl ToSql for PgInterval {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        out.put_i64(self.micros);
        out.put_i32(self.days);
        out.put_i32(self.months);
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }

    to_sql_checked!();
}

/// SQL NULL for a placeholder of any type.
#[derive(Debug)]
struct PgNull;

impl ToSql for PgNull {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// A bound value converted to the placeholder's server-side type.
#[derive(Debug)]
enum PgParam {
    Null(PgNull),
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Time(NaiveTime),
    Interval(PgInterval),
}

impl PgParam {
    fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            PgParam::Null(v) => v,
            PgParam::Bool(v) => v,
            PgParam::Int2(v) => v,
            PgParam::Int4(v) => v,
            PgParam::Int8(v) => v,
            PgParam::Float4(v) => v,
            PgParam::Float8(v) => v,
            PgParam::Numeric(v) => v,
            PgParam::Text(v) => v,
            PgParam::Date(v) => v,
            PgParam::Timestamp(v) => v,
            PgParam::TimestampTz(v) => v,
            PgParam::Time(v) => v,
            PgParam::Interval(v) => v,
        }
    }

    fn resolve(value: &SqlValue, ty: &Type) -> Result<Self> {
        if matches!(value, SqlValue::Null) {
            return Ok(PgParam::Null(PgNull));
        }

        let mismatch = || {
            QueryError::execution_msg(
                FailureKind::TypeMismatch,
                format!("Cannot bind {} value as {}", value.type_name(), ty),
            )
        };

        let param = match *ty {
            Type::BOOL => match value {
                SqlValue::Bool(b) => PgParam::Bool(*b),
                SqlValue::Int(i) => PgParam::Bool(*i != 0),
                SqlValue::Text(s) => PgParam::Bool(parse_bool(s).ok_or_else(mismatch)?),
                _ => return Err(mismatch()),
            },
            Type::INT2 => {
                let i = as_i64(value).ok_or_else(mismatch)?;
                PgParam::Int2(i16::try_from(i).map_err(|_| mismatch())?)
            }
            Type::INT4 => {
                let i = as_i64(value).ok_or_else(mismatch)?;
                PgParam::Int4(i32::try_from(i).map_err(|_| mismatch())?)
            }
            Type::INT8 => PgParam::Int8(as_i64(value).ok_or_else(mismatch)?),
            Type::FLOAT4 => PgParam::Float4(as_f64(value).ok_or_else(mismatch)? as f32),
            Type::FLOAT8 => PgParam::Float8(as_f64(value).ok_or_else(mismatch)?),
            Type::NUMERIC => PgParam::Numeric(match value {
                SqlValue::Int(i) => Decimal::from(*i),
                SqlValue::Float(f) => Decimal::from_f64(*f).ok_or_else(mismatch)?,
                SqlValue::Text(s) => Decimal::from_str(s.trim()).map_err(|_| mismatch())?,
                _ => return Err(mismatch()),
            }),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                PgParam::Text(value.to_text().ok_or_else(mismatch)?)
            }
            Type::DATE => PgParam::Date(match value {
                SqlValue::Date(d) => *d,
                SqlValue::Timestamp(ts) => ts.date(),
                SqlValue::Text(s) => parse_date(s).ok_or_else(mismatch)?,
                _ => return Err(mismatch()),
            }),
            Type::TIMESTAMP => PgParam::Timestamp(as_timestamp(value).ok_or_else(mismatch)?),
            Type::TIMESTAMPTZ => {
                PgParam::TimestampTz(as_timestamp(value).ok_or_else(mismatch)?.and_utc())
            }
            Type::TIME => PgParam::Time(match value {
                SqlValue::Timestamp(ts) => ts.time(),
                SqlValue::Text(s) => NaiveTime::from_str(s.trim()).map_err(|_| mismatch())?,
                _ => return Err(mismatch()),
            }),
            Type::INTERVAL => PgParam::Interval(PgInterval::from_seconds(match value {
                SqlValue::Int(i) => *i as f64,
                SqlValue::Float(f) => *f,
                SqlValue::Text(s) => parse_duration(s).ok_or_else(mismatch)?,
                _ => return Err(mismatch()),
            })),
            _ => {
                return Err(QueryError::execution_msg(
                    FailureKind::TypeMismatch,
                    format!("Unsupported parameter type {}", ty),
                ))
            }
        };
        Ok(param)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "yes" => Some(true),
        "f" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn as_i64(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Int(i) => Some(*i),
        SqlValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        SqlValue::Bool(b) => Some(i64::from(*b)),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Int(i) => Some(*i as f64),
        SqlValue::Float(f) => Some(*f),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &SqlValue) -> Option<NaiveDateTime> {
    match value {
        SqlValue::Timestamp(ts) => Some(*ts),
        SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
        SqlValue::Text(s) => {
            let s = s.trim();
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
        }
        _ => None,
    }
}

fn decode_row(row: &Row) -> Result<Vec<RawValue>> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = match *ty {
            Type::BOOL => row
                .try_get::<_, Option<bool>>(idx)
                .map(|v| v.map_or(RawValue::Null, RawValue::Boolean)),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map_or(RawValue::Null, |v| RawValue::Integer(v.into()))),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map_or(RawValue::Null, |v| RawValue::Integer(v.into()))),
            Type::INT8 => row
                .try_get::<_, Option<i64>>(idx)
                .map(|v| v.map_or(RawValue::Null, RawValue::Integer)),
            Type::OID => row
                .try_get::<_, Option<u32>>(idx)
                .map(|v| v.map_or(RawValue::Null, |v| RawValue::Integer(v.into()))),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map_or(RawValue::Null, |v| RawValue::Float(v.into()))),
            Type::FLOAT8 => row
                .try_get::<_, Option<f64>>(idx)
                .map(|v| v.map_or(RawValue::Null, RawValue::Float)),
            Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx).map(|v| {
                v.map_or(RawValue::Null, |d| match d.to_f64() {
                    Some(f) => RawValue::Float(f),
                    None => RawValue::Text(d.to_string()),
                })
            }),
            Type::DATE => row
                .try_get::<_, Option<NaiveDate>>(idx)
                .map(|v| v.map_or(RawValue::Null, |d| RawValue::Timestamp(Temporal::Date(d)))),
            Type::TIMESTAMP => row.try_get::<_, Option<NaiveDateTime>>(idx).map(|v| {
                v.map_or(RawValue::Null, |d| RawValue::Timestamp(Temporal::DateTime(d)))
            }),
            Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(idx).map(|v| {
                v.map_or(RawValue::Null, |d| RawValue::Timestamp(Temporal::DateTimeUtc(d)))
            }),
            Type::TIME => row
                .try_get::<_, Option<NaiveTime>>(idx)
                .map(|v| v.map_or(RawValue::Null, |t| RawValue::Timestamp(Temporal::Time(t)))),
            Type::INTERVAL => row
                .try_get::<_, Option<PgInterval>>(idx)
                .map(|v| v.map_or(RawValue::Null, |i| RawValue::Duration(i.as_seconds()))),
            _ => row
                .try_get::<_, Option<String>>(idx)
                .map(|v| v.map_or(RawValue::Null, RawValue::Text)),
        }
        .map_err(|e| {
            QueryError::execution(
                FailureKind::TypeMismatch,
                format!("Unsupported column type {} for column '{}'", ty, column.name()),
                e,
            )
        })?;
        values.push(value);
    }
    Ok(values)
}

async fn query_prepared(
    client: &Client,
    stmt: &Statement,
    params: &[SqlValue],
) -> Result<RawResultSet> {
    if stmt.params().len() != params.len() {
        return Err(QueryError::execution_msg(
            FailureKind::Syntax,
            format!(
                "Query expects {} parameters but {} were bound",
                stmt.params().len(),
                params.len()
            ),
        ));
    }

    let bound = stmt
        .params()
        .iter()
        .zip(params)
        .map(|(ty, value)| PgParam::resolve(value, ty))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(PgParam::as_tosql).collect();

    let rows = client.query(stmt, &refs).await.map_err(pg_error)?;

    let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
    let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
    Ok(RawResultSet { columns, rows })
}

#[async_trait]
impl TableStore for PostgresStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Postgres
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<RawResultSet> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let stmt = client.prepare_cached(sql).await.map_err(pg_error)?;
        query_prepared(&client, &stmt, params).await
    }

    async fn fetch_adhoc(&self, sql: &str, params: &[SqlValue]) -> Result<RawResultSet> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let stmt = client.prepare(sql).await.map_err(pg_error)?;
        query_prepared(&client, &stmt, params).await
    }

    fn tables_query(&self) -> BuiltQuery {
        BuiltQuery::new(
            "SELECT table_name::text AS table_name FROM information_schema.tables \
             WHERE table_schema::text = $1 ORDER BY table_name",
            vec![SqlValue::Text(self.schema.clone())],
        )
    }

    fn columns_query(&self, table: &str) -> BuiltQuery {
        BuiltQuery::new(
            "SELECT column_name::text AS column_name, data_type::text AS data_type, \
             udt_name::text AS underlying_type FROM information_schema.columns \
             WHERE table_schema::text = $1 AND table_name::text = $2 ORDER BY ordinal_position",
            vec![
                SqlValue::Text(self.schema.clone()),
                SqlValue::Text(table.to_string()),
            ],
        )
    }
}
