use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use ub515_common::config::{AppConfig, DEFAULT_QUERY_LIMIT};
use ub515_common::scrubber::scrub;

use crate::allow_list::SchemaAllowList;
use crate::builder::{BuiltQuery, SelectBuilder};
use crate::error::{FailureKind, QueryError, Result};
use crate::identifier::{validate_identifier, AggregateFunction};
use crate::request::QueryRequest;
use crate::store::{self, RawResultSet, TableStore};
use crate::value::{normalize, ColumnInfo, ResultRow, ResultSet, SqlValue};

/// Origin of a statement's text.
#[derive(Debug, Clone, Copy)]
enum Statement {
    /// Built by the service from validated identifiers or a catalog query.
    Generated,
    /// Passed in by the caller through [`TabularQueryService::execute`].
    AdHoc,
}

/// Parameterized reads over one backing store.
///
/// Holds the store handle and a lazily loaded identifier allow-list; every
/// call acquires and releases its own store session.
pub struct TabularQueryService {
    store: Arc<dyn TableStore>,
    allow_list: RwLock<Option<Arc<SchemaAllowList>>>,
    default_limit: u32,
}

impl TabularQueryService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            allow_list: RwLock::new(None),
            default_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Connect to the configured store.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = store::connect(&config.database)?;
        Ok(Self::new(store).with_default_limit(config.query.default_limit))
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    /// Run `sql` with positional `params` and normalize every cell.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        let raw = self.fetch(sql, params, Statement::AdHoc).await?;
        Ok(into_rows(raw))
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue], kind: Statement) -> Result<RawResultSet> {
        debug!(
            backend = self.store.backend().as_str(),
            sql = %scrub(sql),
            params = params.len(),
            "Executing query"
        );
        let result = match kind {
            Statement::Generated => self.store.fetch(sql, params).await,
            Statement::AdHoc => self.store.fetch_adhoc(sql, params).await,
        };
        result.map_err(|e| {
            error!(
                backend = self.store.backend().as_str(),
                sql = %scrub(sql),
                error = %scrub(&e.to_string()),
                "Query failed"
            );
            e
        })
    }

    pub async fn get_all(&self, table: &str, limit: Option<u32>) -> Result<ResultSet> {
        self.run(&QueryRequest::new(table).limit(limit)).await
    }

    /// Rows where every `(column, value)` pair matches. No filters behaves
    /// like [`get_all`](Self::get_all).
    pub async fn get_by_filter<K: AsRef<str>>(
        &self,
        table: &str,
        filters: &[(K, SqlValue)],
        limit: Option<u32>,
    ) -> Result<ResultSet> {
        let request = filters
            .iter()
            .fold(QueryRequest::new(table).limit(limit), |req, (col, val)| {
                req.filter(col.as_ref(), val.clone())
            });
        self.run(&request).await
    }

    pub async fn get_by_date_range(
        &self,
        table: &str,
        date_column: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        limit: Option<u32>,
    ) -> Result<ResultSet> {
        let request = QueryRequest::new(table)
            .date_range(date_column, start, end)
            .limit(limit);
        self.run(&request).await
    }

    /// `SELECT group_by, FN(agg_column) AS aggregated_value ... GROUP BY group_by`.
    pub async fn get_aggregated(
        &self,
        table: &str,
        group_by: &str,
        agg_column: &str,
        agg_function: AggregateFunction,
        limit: Option<u32>,
    ) -> Result<ResultSet> {
        let request = QueryRequest::new(table)
            .aggregate(group_by, agg_column, agg_function)
            .limit(limit);
        self.run(&request).await
    }

    /// Columns of `table` in physical order. Unknown tables yield an empty list.
    pub async fn get_schema(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = self.store.columns_query(table);
        let raw = self.fetch(&query.sql, &query.params, Statement::Generated).await?;
        columns_from_rows(into_rows(raw))
    }

    pub async fn get_all_tables(&self) -> Result<BTreeSet<String>> {
        let query = self.store.tables_query();
        let raw = self.fetch(&query.sql, &query.params, Statement::Generated).await?;
        into_rows(raw)
            .iter()
            .map(|row| text_cell(row, "table_name"))
            .collect()
    }

    /// Validate every identifier in `request`, build one SELECT and run it.
    #[instrument(skip(self, request), fields(table = %request.table))]
    pub async fn run(&self, request: &QueryRequest) -> Result<ResultSet> {
        // Screened before anything touches the store, catalog loading included.
        for (kind, name) in request.identifiers() {
            validate_identifier(kind, name)?;
        }

        let allow_list = self.allow_list().await?;
        let query = self.build(&allow_list, request)?;
        let raw = self.fetch(&query.sql, &query.params, Statement::Generated).await?;
        Ok(into_rows(raw))
    }

    fn build(&self, allow_list: &SchemaAllowList, request: &QueryRequest) -> Result<BuiltQuery> {
        let table = allow_list.table(&request.table)?;
        let mut builder = SelectBuilder::new(self.store.dialect(), self.store.schema(), &table);

        for (column, value) in &request.filters {
            let column = allow_list.column(&table, column)?;
            builder = builder.filter_eq(&column, value.clone());
        }

        if let Some(range) = &request.date_range {
            let column = allow_list.column(&table, &range.column)?;
            builder = builder.between(
                &column,
                SqlValue::Timestamp(range.start),
                SqlValue::Timestamp(range.end),
            );
        }

        if let Some(agg) = &request.aggregation {
            let group_by = allow_list.column(&table, &agg.group_by)?;
            let agg_column = allow_list.column(&table, &agg.agg_column)?;
            builder = builder.aggregate(&group_by, &agg_column, agg.agg_function);
        }

        Ok(builder.limit(request.limit.unwrap_or(self.default_limit)))
    }

    /// Current allow-list, loading it from the catalog on first use.
    pub async fn allow_list(&self) -> Result<Arc<SchemaAllowList>> {
        if let Some(list) = self.allow_list.read().await.as_ref() {
            return Ok(list.clone());
        }

        let mut slot = self.allow_list.write().await;
        if let Some(list) = slot.as_ref() {
            return Ok(list.clone());
        }
        let list = Arc::new(self.load_allow_list(1).await?);
        *slot = Some(list.clone());
        Ok(list)
    }

    /// Reload the allow-list from the catalog. Returns the new version.
    pub async fn refresh_allow_list(&self) -> Result<u64> {
        let mut slot = self.allow_list.write().await;
        let version = slot.as_ref().map_or(1, |l| l.version() + 1);
        let list = self.load_allow_list(version).await?;
        *slot = Some(Arc::new(list));
        Ok(version)
    }

    async fn load_allow_list(&self, version: u64) -> Result<SchemaAllowList> {
        let mut tables = BTreeMap::new();
        for table in self.get_all_tables().await? {
            let columns = self.get_schema(&table).await?;
            tables.insert(table, columns);
        }
        info!(
            version,
            tables = tables.len(),
            backend = self.store.backend().as_str(),
            "Loaded schema allow-list"
        );
        Ok(SchemaAllowList::new(version, tables))
    }
}

fn into_rows(raw: RawResultSet) -> ResultSet {
    let RawResultSet { columns, rows } = raw;
    rows.into_iter()
        .map(|cells| {
            columns
                .iter()
                .cloned()
                .zip(cells.into_iter().map(normalize))
                .collect::<ResultRow>()
        })
        .collect()
}

fn text_cell(row: &ResultRow, column: &str) -> Result<String> {
    row.get(column)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            QueryError::execution_msg(
                FailureKind::Other,
                format!("Catalog row is missing text column '{}'", column),
            )
        })
}

fn columns_from_rows(rows: ResultSet) -> Result<Vec<ColumnInfo>> {
    rows.iter()
        .map(|row| {
            Ok(ColumnInfo {
                column_name: text_cell(row, "column_name")?,
                data_type: text_cell(row, "data_type")?,
                underlying_type: text_cell(row, "underlying_type")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{RawValue, Scalar};

    #[test]
    fn test_into_rows_preserves_column_order_and_nulls() {
        let raw = RawResultSet {
            columns: vec!["id".into(), "overall".into(), "club".into()],
            rows: vec![vec![
                RawValue::Integer(1),
                RawValue::Duration(5025.5),
                RawValue::Null,
            ]],
        };
        let rows = into_rows(raw);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "overall", "club"]);
        assert_eq!(row.get("overall"), Some(&Scalar::Duration("1:23:45.500".into())));
        assert_eq!(row.get("club"), Some(&Scalar::Null));
    }

    #[test]
    fn test_columns_from_rows_requires_catalog_columns() {
        let row: ResultRow = vec![("column_name".to_string(), Scalar::Text("id".into()))]
            .into_iter()
            .collect();
        let err = columns_from_rows(vec![row]).unwrap_err();
        assert!(err.to_string().contains("data_type"));
    }
}
