//! Syntactic screening and quoting of SQL identifiers.
//!
//! Screening runs before anything touches the store. It is not sufficient on
//! its own; identifiers must also be present in the [`SchemaAllowList`].
//!
//! [`SchemaAllowList`]: crate::allow_list::SchemaAllowList

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{QueryError, Result};

pub const MAX_IDENTIFIER_LEN: usize = 128;

const FORBIDDEN_CHARS: &[char] = &['"', '\0', ';', '`', '\\'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Function,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
            IdentifierKind::Function => "function",
        };
        f.write_str(s)
    }
}

pub fn validate_identifier(kind: IdentifierKind, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(QueryError::invalid_identifier(kind, name, "empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(QueryError::invalid_identifier(
            kind,
            name,
            format!("too long: {}", name.len()),
        ));
    }
    if name.contains(FORBIDDEN_CHARS) {
        return Err(QueryError::invalid_identifier(
            kind,
            name,
            "forbidden characters",
        ));
    }
    Ok(())
}

/// Double-quote an identifier that already passed [`validate_identifier`].
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Aggregation functions accepted by `get_aggregated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Count,
        AggregateFunction::Sum,
        AggregateFunction::Avg,
        AggregateFunction::Min,
        AggregateFunction::Max,
    ];

    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for AggregateFunction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_sql().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                QueryError::invalid_identifier(
                    IdentifierKind::Function,
                    s,
                    "not one of COUNT, SUM, AVG, MIN, MAX",
                )
            })
    }
}
