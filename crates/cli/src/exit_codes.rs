//! Process exit codes, one per error category.

/// General error (fallback for unknown errors)
pub const GENERAL_ERROR: i32 = 1;

/// Configuration error (YAML parse failure, missing connection settings)
pub const CONFIG_ERROR: i32 = 3;

/// Connection error (store unreachable, pool exhausted, timeout)
pub const CONNECTION_ERROR: i32 = 4;

/// Validation error (unknown table or column, rejected identifier or argument, failed query)
pub const VALIDATION_ERROR: i32 = 5;
