//! Cell values: what callers bind, what stores return, and what callers get back.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A value bound to a query placeholder. Never interpolated into query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl SqlValue {
    /// A command-line literal: `null` binds NULL, anything else binds as text
    /// and is converted by the store against the column it is compared with.
    /// `007` stays `007`.
    pub fn from_literal(literal: &str) -> Self {
        if literal.eq_ignore_ascii_case("null") {
            SqlValue::Null
        } else {
            SqlValue::Text(literal.to_string())
        }
    }

    /// Text form used when a store has no native type for the value.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            SqlValue::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Date(_) => "date",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Text(_) => "text",
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// A point in time (or time of day) as returned by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Temporal {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Time(NaiveTime),
}

impl Temporal {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Temporal::Date(d) => Some(*d),
            Temporal::DateTime(dt) => Some(dt.date()),
            Temporal::DateTimeUtc(dt) => Some(dt.date_naive()),
            Temporal::Time(_) => None,
        }
    }
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temporal::Date(d) => write!(f, "{}", d),
            Temporal::DateTime(dt) => write!(f, "{}", dt),
            Temporal::DateTimeUtc(dt) => write!(f, "{}", dt.to_rfc3339()),
            Temporal::Time(t) => write!(f, "{}", t),
        }
    }
}

/// A cell exactly as a store decoded it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(Temporal),
    /// Elapsed time span in seconds.
    Duration(f64),
}

/// A cell as handed to callers. Serializes to plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(Temporal),
    /// Duration pre-formatted as `H:MM:SS.mmm`.
    Duration(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            Scalar::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text, or the formatted form of a duration.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) | Scalar::Duration(s) => Some(s),
            _ => None,
        }
    }

    /// Calendar date of a temporal value; ISO `YYYY-MM-DD` prefixes of text
    /// are accepted because SQLite stores dates as text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Timestamp(t) => t.date(),
            Scalar::Text(s) => s
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Text(s) | Scalar::Duration(s) => write!(f, "{}", s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Timestamp(t) => write!(f, "{}", t),
        }
    }
}

impl From<RawValue> for Scalar {
    fn from(raw: RawValue) -> Self {
        normalize(raw)
    }
}

/// Map a store cell to its caller-facing form. Durations are the only values
/// that change shape.
pub fn normalize(raw: RawValue) -> Scalar {
    match raw {
        RawValue::Null => Scalar::Null,
        RawValue::Text(s) => Scalar::Text(s),
        RawValue::Integer(i) => Scalar::Integer(i),
        RawValue::Float(f) => Scalar::Float(f),
        RawValue::Boolean(b) => Scalar::Boolean(b),
        RawValue::Timestamp(t) => Scalar::Timestamp(t),
        RawValue::Duration(seconds) => Scalar::Duration(format_duration(seconds)),
    }
}

/// Format a span of `total_seconds` as `H:MM:SS.mmm`.
///
/// Hours are unbounded (`25:00:00.000` for 90000 s) and not padded; minutes
/// and whole seconds are two digits; milliseconds are rounded. Negative spans
/// get a leading `-`.
pub fn format_duration(total_seconds: f64) -> String {
    let sign = if total_seconds < 0.0 { "-" } else { "" };
    let total_millis = (total_seconds.abs() * 1000.0).round() as u64;

    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let millis = total_millis % 60_000;

    format!(
        "{}{}:{:02}:{:02}.{:03}",
        sign,
        hours,
        minutes,
        millis / 1000,
        millis % 1000
    )
}

/// Parse `H:M:S` (each part a decimal number, e.g. `26:03:15.250`) into
/// seconds. Anything else yields `None`.
pub fn parse_duration(text: &str) -> Option<f64> {
    let mut parts = text.trim().split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let h: f64 = h.trim().parse().ok()?;
    let m: f64 = m.trim().parse().ok()?;
    let s: f64 = s.trim().parse().ok()?;
    let total = h * 3600.0 + m * 60.0 + s;
    total.is_finite().then_some(total)
}

/// One row of a result set: columns in store order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    entries: Vec<(String, Scalar)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Scalar) {
        self.entries.push((column.into(), value));
    }

    /// First value stored under `column`.
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, value) in &self.entries {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Ordered rows, at most the requested limit.
pub type ResultSet = Vec<ResultRow>;

/// One catalog entry for a column, in physical table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    /// Catalog type name (`interval`, `integer`, `character varying`, ...)
    pub data_type: String,
    /// Native type name (`interval`, `int4`, `varchar`, ...)
    pub underlying_type: String,
}

impl ColumnInfo {
    /// Calendar-date columns (not timestamps).
    pub fn is_date(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("date")
            || self.underlying_type.eq_ignore_ascii_case("date")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_examples() {
        assert_eq!(format_duration(5025.5), "1:23:45.500");
        assert_eq!(format_duration(90000.0), "25:00:00.000");
        assert_eq!(format_duration(0.0), "0:00:00.000");
        assert_eq!(format_duration(59.25), "0:00:59.250");
    }

    #[test]
    fn test_format_duration_multi_day_race() {
        // 3 days, 4 hours, 5 minutes, 6.789 seconds
        let seconds = 3.0 * 86400.0 + 4.0 * 3600.0 + 5.0 * 60.0 + 6.789;
        assert_eq!(format_duration(seconds), "76:05:06.789");
    }

    #[test]
    fn test_format_duration_rounds_into_next_minute() {
        assert_eq!(format_duration(59.9996), "0:01:00.000");
    }

    #[test]
    fn test_format_duration_negative() {
        assert_eq!(format_duration(-61.5), "-0:01:01.500");
    }

    #[test]
    fn test_format_duration_matches_reference_formula() {
        for d in [1.0, 61.0, 3599.0, 3600.0, 86399.0, 86400.0, 100_000.0, 123_456.0] {
            let d_int = d as u64;
            let expected = format!(
                "{}:{:02}:{:06.3}",
                d_int / 3600,
                (d_int % 3600) / 60,
                d % 60.0
            );
            assert_eq!(format_duration(d), expected);
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1:23:45.500"), Some(5025.5));
        assert_eq!(parse_duration("25:00:00"), Some(90000.0));
        assert_eq!(parse_duration(" 0:01:30 "), Some(90.0));
        assert_eq!(parse_duration("01:30"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("DNF"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_inverts_format() {
        for seconds in [0.0, 59.25, 5025.5, 90000.0, 273_906.5] {
            assert_eq!(parse_duration(&format_duration(seconds)), Some(seconds));
        }
    }

    #[test]
    fn test_normalize_is_identity_except_duration() {
        assert_eq!(normalize(RawValue::Null), Scalar::Null);
        assert_eq!(normalize(RawValue::Integer(7)), Scalar::Integer(7));
        assert_eq!(normalize(RawValue::Float(1.5)), Scalar::Float(1.5));
        assert_eq!(normalize(RawValue::Boolean(true)), Scalar::Boolean(true));
        assert_eq!(
            normalize(RawValue::Text("Ubatuba".into())),
            Scalar::Text("Ubatuba".into())
        );
        let date = NaiveDate::from_ymd_opt(2023, 5, 13).unwrap();
        assert_eq!(
            normalize(RawValue::Timestamp(Temporal::Date(date))),
            Scalar::Timestamp(Temporal::Date(date))
        );
        assert_eq!(
            normalize(RawValue::Duration(5025.5)),
            Scalar::Duration("1:23:45.500".into())
        );
    }

    #[test]
    fn test_result_row_serializes_in_column_order() {
        let row: ResultRow = vec![
            ("zeta".to_string(), Scalar::Integer(1)),
            ("alpha".to_string(), Scalar::Null),
            ("mid".to_string(), Scalar::Duration("0:00:01.000".into())),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":null,"mid":"0:00:01.000"}"#);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_sql_value_from_literal_keeps_text() {
        assert_eq!(SqlValue::from_literal("NULL"), SqlValue::Null);
        assert_eq!(SqlValue::from_literal("007"), SqlValue::Text("007".into()));
        assert_eq!(SqlValue::from_literal("1e3"), SqlValue::Text("1e3".into()));
        assert_eq!(SqlValue::from_literal("42"), SqlValue::Text("42".into()));
        assert_eq!(SqlValue::from_literal("Ubatuba"), SqlValue::Text("Ubatuba".into()));
    }

    #[test]
    fn test_scalar_as_date_accepts_sqlite_text() {
        let expected = NaiveDate::from_ymd_opt(1985, 2, 28);
        assert_eq!(Scalar::Text("1985-02-28".into()).as_date(), expected);
        assert_eq!(
            Scalar::Text("1985-02-28 00:00:00".into()).as_date(),
            expected
        );
        assert_eq!(Scalar::Text("28/02/1985".into()).as_date(), None);
    }
}
