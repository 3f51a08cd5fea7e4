//! Argument parsing and table shaping shared by the commands.

use chrono::{NaiveDate, NaiveDateTime};
use ub515_error::{ErrorCode, Ub515Error};
use ub515_query::{ColumnInfo, ResultSet, SqlValue};

fn usage(message: String) -> Ub515Error {
    Ub515Error::new(ErrorCode::SyntaxError, message)
}

/// Parse a `column=value` filter. The value is read with [`SqlValue::from_literal`].
pub fn parse_assignment(raw: &str) -> Result<(String, SqlValue), Ub515Error> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| usage(format!("Expected column=value, got '{}'", raw)))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(usage(format!("Missing column name in '{}'", raw)));
    }
    Ok((column.to_string(), SqlValue::from_literal(value.trim())))
}

/// Parse a range bound: a date (`2019-05-11`, midnight) or a date-time with
/// `T` or a space between date and time.
pub fn parse_bound(raw: &str) -> Result<NaiveDateTime, Ub515Error> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            usage(format!(
                "Invalid date '{}': expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS",
                raw
            ))
        })
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, Ub515Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| usage(format!("Invalid date '{}': expected YYYY-MM-DD", raw)))
}

/// Headers and stringified cells of a result set, in column order.
pub fn result_table(rows: &ResultSet) -> (Vec<String>, Vec<Vec<String>>) {
    let headers: Vec<String> = rows
        .first()
        .map(|r| r.columns().map(str::to_string).collect())
        .unwrap_or_default();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.values().map(|v| v.to_string()).collect())
        .collect();
    (headers, cells)
}

pub fn schema_table(columns: &[ColumnInfo]) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = ["column_name", "data_type", "underlying_type"]
        .map(str::to_string)
        .to_vec();
    let cells = columns
        .iter()
        .map(|c| {
            vec![
                c.column_name.clone(),
                c.data_type.clone(),
                c.underlying_type.clone(),
            ]
        })
        .collect();
    (headers, cells)
}
