//! # Error Contexts
//!
//! Structured metadata attached to errors so callers can react without
//! parsing messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for UB515-2002 (FieldNotFound)
    FieldNotFound {
        field: String,
        table: Option<String>,
        available_fields: Vec<String>,
    },

    /// Context for UB515-2003 (TableNotFound)
    TableNotFound {
        table: String,
        available_tables: Vec<String>,
    },

    /// Context for UB515-2005 / 2006 (identifier rejected)
    InvalidIdentifier {
        /// What the identifier was used as: table, column or function
        kind: String,
        identifier: String,
        reason: String,
    },

    /// Context for connection errors (UB515-1001..1003)
    Connection {
        backend: String,
        host: Option<String>,
        port: Option<u16>,
        database: Option<String>,
    },

    /// Context for UB515-2001 / 2007 when the store reported a SQLSTATE
    Store {
        sqlstate: Option<String>,
        detail: Option<String>,
    },

    /// Context for configuration errors (UB515-3xxx)
    Config {
        file_path: Option<String>,
        field: Option<String>,
    },

    /// Generic key-value context
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
