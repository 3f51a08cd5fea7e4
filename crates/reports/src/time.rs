//! Conversions for `H:MM:SS.fff` split times.

use ub515_query::parse_duration;

/// Seconds in `H:MM:SS.fff`, or `None` when the text does not have three
/// numeric parts.
pub fn parse_hms(text: &str) -> Option<f64> {
    parse_duration(text)
}

pub fn time_to_minutes(text: &str) -> Option<f64> {
    parse_hms(text).map(|s| s / 60.0)
}

pub fn time_to_hours(text: &str) -> Option<f64> {
    parse_hms(text).map(|s| s / 3600.0)
}
