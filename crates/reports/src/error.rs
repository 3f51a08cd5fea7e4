use thiserror::Error;
use ub515_error::{ErrorCode, ErrorContext, Ub515Error};
use ub515_query::QueryError;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to load '{table}': {source}")]
    Load {
        table: String,
        #[source]
        source: QueryError,
    },

    #[error("Table '{table}' has no column '{column}' required for reports")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}' has more than {limit} rows; reports would cover only part of it")]
    Truncated { table: String, limit: u32 },
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn to_ub515_error(self, backend: &str) -> Ub515Error {
        match self {
            ReportError::Load { source, .. } => source.to_ub515_error(backend),
            ReportError::MissingColumn { table, column } => Ub515Error::new(
                ErrorCode::FieldNotFound,
                format!("Table '{}' has no column '{}'", table, column),
            )
            .with_context(ErrorContext::FieldNotFound {
                field: column,
                table: Some(table),
                available_fields: Vec::new(),
            })
            .with_hint("Check the reports.*_table settings point at the race tables"),
            ReportError::Truncated { table, limit } => {
                let message = format!("Table '{}' has more than {} rows", table, limit);
                let mut data = std::collections::HashMap::new();
                data.insert("table".to_string(), serde_json::json!(table));
                data.insert("row_limit".to_string(), serde_json::json!(limit));
                Ub515Error::new(ErrorCode::RowLimitExceeded, message)
                    .with_context(ErrorContext::Generic { data })
                    .with_hint("Raise reports.row_limit (UB515_REPORTS__ROW_LIMIT)")
            }
        }
    }
}
