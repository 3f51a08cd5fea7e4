use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following the UB515-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Connection errors
/// - **2000-2999**: Query errors
/// - **3000-3999**: Configuration errors
/// - **5000-5999**: Internal errors
///
/// Codes are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Connection Errors (1000-1999) ===
    /// UB515-1001: Could not open a session against the store
    ConnectionFailed = 1001,
    /// UB515-1002: Connection pool exhausted or closed
    PoolExhausted = 1002,
    /// UB515-1003: Network connection timeout
    ConnectionTimeout = 1003,

    // === Query Errors (2000-2999) ===
    /// UB515-2001: SQL syntax error
    SyntaxError = 2001,
    /// UB515-2002: Column not found
    FieldNotFound = 2002,
    /// UB515-2003: Table not found
    TableNotFound = 2003,
    /// UB515-2004: Bound value does not fit the column type
    TypeMismatch = 2004,
    /// UB515-2005: Identifier rejected before query construction
    InvalidIdentifier = 2005,
    /// UB515-2006: Aggregation function outside the supported set
    UnsupportedAggregate = 2006,
    /// UB515-2007: Store rejected the query for another reason
    QueryFailed = 2007,

    // === Configuration Errors (3000-3999) ===
    /// UB515-3001: Configuration could not be loaded or parsed
    InvalidConfig = 3001,
    /// UB515-3002: Required setting missing
    MissingRequiredField = 3002,
    /// UB515-3003: Connection settings rejected
    InvalidConnectionSettings = 3003,
    /// UB515-3004: A table holds more rows than the configured read limit
    RowLimitExceeded = 3004,

    // === Internal Errors (5000-5999) ===
    /// UB515-5001: Serialization/deserialization failed
    SerializationFailed = 5001,
    /// UB515-5002: Unexpected internal state
    InternalPanic = 5002,

    /// UB515-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Formatted code string (e.g., "UB515-2002")
    pub fn as_str(&self) -> String {
        format!("UB515-{:04}", self.as_u16())
    }

    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Connection,
            2000..=2999 => ErrorCategory::Query,
            3000..=3999 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("UB515-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::ConnectionFailed),
            1002 => Ok(Self::PoolExhausted),
            1003 => Ok(Self::ConnectionTimeout),
            2001 => Ok(Self::SyntaxError),
            2002 => Ok(Self::FieldNotFound),
            2003 => Ok(Self::TableNotFound),
            2004 => Ok(Self::TypeMismatch),
            2005 => Ok(Self::InvalidIdentifier),
            2006 => Ok(Self::UnsupportedAggregate),
            2007 => Ok(Self::QueryFailed),
            3001 => Ok(Self::InvalidConfig),
            3002 => Ok(Self::MissingRequiredField),
            3003 => Ok(Self::InvalidConnectionSettings),
            3004 => Ok(Self::RowLimitExceeded),
            5001 => Ok(Self::SerializationFailed),
            5002 => Ok(Self::InternalPanic),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category, used for exit-code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Connection,
    Query,
    Config,
    Internal,
}
