//! CLI command implementations.

mod explore;
mod helpers;
mod report;

pub use explore::{aggregate, filter, range, rows, schema, sql, tables};
pub use helpers::parse_date;
pub use report::{report, ReportKind};
