//! # ub515-query
//!
//! Generic parameterized reads over a relational store.
//!
//! A caller names a table, equality filters, an optional date range and an
//! optional aggregation. [`TabularQueryService`] validates every identifier
//! against the catalog, builds one parameterized SELECT, runs it in a scoped
//! store session and returns [`ResultRow`]s whose cells are plain scalars
//! (durations rendered as `H:MM:SS.mmm`).
//!
//! ```no_run
//! # async fn demo() -> ub515_query::Result<()> {
//! use ub515_common::DatabaseSettings;
//! use ub515_query::{store, SqlValue, TabularQueryService};
//!
//! let service = TabularQueryService::new(store::connect(&DatabaseSettings::sqlite("ub515.db"))?);
//! let rows = service
//!     .get_by_filter("athletes_results", &[("race_id", SqlValue::Int(3))], Some(20))
//!     .await?;
//! println!("{}", serde_json::to_string(&rows).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod allow_list;
pub mod builder;
pub mod error;
pub mod identifier;
pub mod request;
pub mod service;
pub mod store;
pub mod value;

pub use allow_list::{SchemaAllowList, ValidatedColumn, ValidatedTable};
pub use builder::{BuiltQuery, Dialect, AGGREGATED_VALUE};
pub use error::{FailureKind, QueryError, Result};
pub use identifier::{AggregateFunction, IdentifierKind};
pub use request::{Aggregation, DateRange, QueryRequest};
pub use service::TabularQueryService;
pub use store::{RawResultSet, TableStore};
pub use value::{
    format_duration, normalize, parse_duration, ColumnInfo, RawValue, ResultRow, ResultSet,
    Scalar, SqlValue, Temporal,
};
