//! SELECT statement assembly.
//!
//! Identifiers enter only as [`ValidatedTable`] / [`ValidatedColumn`] and are
//! emitted double-quoted. Every value, the LIMIT included, becomes a bound
//! parameter.

use crate::allow_list::{ValidatedColumn, ValidatedTable};
use crate::identifier::{quote_identifier, AggregateFunction};
use crate::value::SqlValue;

/// Alias of the aggregate column in `get_aggregated` results.
pub const AGGREGATED_VALUE: &str = "aggregated_value";

/// Placeholder syntax of the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$1`, `$2`, ...
    Postgres,
    /// `?1`, `?2`, ...
    Sqlite,
}

impl Dialect {
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => format!("?{}", index),
        }
    }
}

/// Query text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

struct Aggregate {
    group_by: String,
    column: String,
    function: AggregateFunction,
}

pub struct SelectBuilder {
    dialect: Dialect,
    from: String,
    aggregate: Option<Aggregate>,
    predicates: Vec<String>,
    params: Vec<SqlValue>,
}

impl SelectBuilder {
    /// `SELECT * FROM table`, optionally schema-qualified.
    pub fn new(dialect: Dialect, schema: Option<&str>, table: &ValidatedTable) -> Self {
        let from = match schema {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(table.as_str())
            ),
            None => quote_identifier(table.as_str()),
        };
        Self {
            dialect,
            from,
            aggregate: None,
            predicates: Vec::new(),
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// `column = value`; a null value becomes `column IS NULL`.
    pub fn filter_eq(mut self, column: &ValidatedColumn, value: SqlValue) -> Self {
        let ident = quote_identifier(column.name());
        let predicate = match coerce_to_column(column, value) {
            SqlValue::Null => format!("{} IS NULL", ident),
            value => format!("{} = {}", ident, self.bind(value)),
        };
        self.predicates.push(predicate);
        self
    }

    /// `column BETWEEN start AND end`, bounds inclusive.
    pub fn between(mut self, column: &ValidatedColumn, start: SqlValue, end: SqlValue) -> Self {
        let start = self.bind(coerce_to_column(column, start));
        let end = self.bind(coerce_to_column(column, end));
        self.predicates.push(format!(
            "{} BETWEEN {} AND {}",
            quote_identifier(column.name()),
            start,
            end
        ));
        self
    }

    pub fn aggregate(
        mut self,
        group_by: &ValidatedColumn,
        column: &ValidatedColumn,
        function: AggregateFunction,
    ) -> Self {
        self.aggregate = Some(Aggregate {
            group_by: quote_identifier(group_by.name()),
            column: quote_identifier(column.name()),
            function,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> BuiltQuery {
        let projection = match &self.aggregate {
            Some(agg) => format!(
                "{}, {}({}) AS {}",
                agg.group_by, agg.function, agg.column, AGGREGATED_VALUE
            ),
            None => "*".to_string(),
        };

        let mut sql = format!("SELECT {} FROM {}", projection, self.from);
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicates.join(" AND "));
        }
        if let Some(agg) = &self.aggregate {
            sql.push_str(&format!(" GROUP BY {} ORDER BY {}", agg.group_by, agg.group_by));
        }

        let limit = self.bind(SqlValue::Int(limit.into()));
        sql.push_str(" LIMIT ");
        sql.push_str(&limit);

        BuiltQuery {
            sql,
            params: self.params,
        }
    }
}

/// Timestamps compared against a `date` column are truncated to the date.
fn coerce_to_column(column: &ValidatedColumn, value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Timestamp(ts) if column.info().is_date() => SqlValue::Date(ts.date()),
        other => other,
    }
}
