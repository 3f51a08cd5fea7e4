use std::collections::HashMap;
use thiserror::Error;
use ub515_error::{ErrorCode, ErrorContext, Ub515Error};

use crate::identifier::IdentifierKind;

/// What went wrong inside the store, as far as it can be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    PoolExhausted,
    Timeout,
    Syntax,
    UndefinedTable,
    UndefinedColumn,
    TypeMismatch,
    Other,
}

impl FailureKind {
    /// Classify a PostgreSQL/SQLSTATE code.
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "42601" => FailureKind::Syntax,
            "42P01" => FailureKind::UndefinedTable,
            "42703" => FailureKind::UndefinedColumn,
            "42804" | "42883" | "22P02" | "22007" | "22008" => FailureKind::TypeMismatch,
            "57014" => FailureKind::Timeout,
            c if c.starts_with("08") => FailureKind::Connection,
            _ => FailureKind::Other,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid {kind} identifier '{name}': {reason}")]
    IdentifierValidation {
        kind: IdentifierKind,
        name: String,
        reason: String,
        /// Known identifiers of the same kind, for the caller's benefit
        available: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("Query execution failed: {message}")]
    QueryExecution {
        message: String,
        kind: FailureKind,
        sqlstate: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    pub(crate) fn invalid_identifier(
        kind: IdentifierKind,
        name: &str,
        reason: impl Into<String>,
    ) -> Self {
        QueryError::IdentifierValidation {
            kind,
            name: name.to_string(),
            reason: reason.into(),
            available: Vec::new(),
            suggestion: None,
        }
    }

    pub(crate) fn unknown_identifier(kind: IdentifierKind, name: &str, available: Vec<String>) -> Self {
        let suggestion = ub515_error::find_closest_match(name, &available);
        QueryError::IdentifierValidation {
            kind,
            name: name.to_string(),
            reason: "not present in the schema allow-list".to_string(),
            available,
            suggestion,
        }
    }

    pub(crate) fn execution<E>(kind: FailureKind, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        QueryError::QueryExecution {
            message: message.into(),
            kind,
            sqlstate: None,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn execution_msg(kind: FailureKind, message: impl Into<String>) -> Self {
        QueryError::QueryExecution {
            message: message.into(),
            kind,
            sqlstate: None,
            source: None,
        }
    }

    pub fn is_identifier_validation(&self) -> bool {
        matches!(self, QueryError::IdentifierValidation { .. })
    }

    pub fn is_query_execution(&self) -> bool {
        matches!(self, QueryError::QueryExecution { .. })
    }

    pub fn to_ub515_error(self, backend: &str) -> Ub515Error {
        match self {
            QueryError::Configuration(message) => {
                Ub515Error::new(ErrorCode::InvalidConnectionSettings, message)
                    .with_hint("Check the database section of the configuration file and the DB_* environment variables")
            }
            QueryError::IdentifierValidation {
                kind,
                name,
                reason,
                available,
                suggestion,
            } => {
                let (code, context) = match kind {
                    IdentifierKind::Table if !available.is_empty() => (
                        ErrorCode::TableNotFound,
                        ErrorContext::TableNotFound {
                            table: name.clone(),
                            available_tables: available,
                        },
                    ),
                    IdentifierKind::Column if !available.is_empty() => (
                        ErrorCode::FieldNotFound,
                        ErrorContext::FieldNotFound {
                            field: name.clone(),
                            table: None,
                            available_fields: available,
                        },
                    ),
                    IdentifierKind::Function => (
                        ErrorCode::UnsupportedAggregate,
                        ErrorContext::InvalidIdentifier {
                            kind: kind.to_string(),
                            identifier: name.clone(),
                            reason: reason.clone(),
                        },
                    ),
                    _ => (
                        ErrorCode::InvalidIdentifier,
                        ErrorContext::InvalidIdentifier {
                            kind: kind.to_string(),
                            identifier: name.clone(),
                            reason: reason.clone(),
                        },
                    ),
                };

                let err = Ub515Error::new(
                    code,
                    format!("Invalid {} identifier '{}': {}", kind, name, reason),
                )
                .with_context(context);

                match (suggestion, kind) {
                    (Some(s), _) => err.with_hint(format!("Did you mean '{}'?", s)),
                    (None, IdentifierKind::Function) => {
                        err.with_hint("Supported functions: COUNT, SUM, AVG, MIN, MAX")
                    }
                    (None, _) => err,
                }
            }
            QueryError::QueryExecution {
                message,
                kind,
                sqlstate,
                ..
            } => {
                let code = match kind {
                    FailureKind::Connection => ErrorCode::ConnectionFailed,
                    FailureKind::PoolExhausted => ErrorCode::PoolExhausted,
                    FailureKind::Timeout => ErrorCode::ConnectionTimeout,
                    FailureKind::Syntax => ErrorCode::SyntaxError,
                    FailureKind::UndefinedTable => ErrorCode::TableNotFound,
                    FailureKind::UndefinedColumn => ErrorCode::FieldNotFound,
                    FailureKind::TypeMismatch => ErrorCode::TypeMismatch,
                    FailureKind::Other => ErrorCode::QueryFailed,
                };

                let context = match code.category() {
                    ub515_error::ErrorCategory::Connection => {
                        let mut data = HashMap::new();
                        data.insert(
                            "backend".to_string(),
                            serde_json::Value::String(backend.to_string()),
                        );
                        ErrorContext::Generic { data }
                    }
                    _ => ErrorContext::Store {
                        sqlstate,
                        detail: None,
                    },
                };

                Ub515Error::new(code, message).with_context(context)
            }
        }
    }
}

impl From<QueryError> for Ub515Error {
    fn from(err: QueryError) -> Self {
        err.to_ub515_error("unknown")
    }
}
