//! Table browsing commands.
//!
//! `tables` and `schema` read the catalog; `rows`, `filter`, `range` and
//! `aggregate` go through the validated query path; `sql` runs a caller's
//! statement with bound `--param` values.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use ub515_error::Ub515Error;
use ub515_query::{AggregateFunction, ResultSet, SqlValue, TabularQueryService};

use super::helpers::{parse_assignment, parse_bound, result_table, schema_table};
use crate::output::{self, OutputFormat};

/// Map a query-layer error to the shared error type, tagged with the backend.
pub(crate) fn lift<T>(
    service: &TabularQueryService,
    result: ub515_query::Result<T>,
) -> std::result::Result<T, Ub515Error> {
    result.map_err(|e| e.to_ub515_error(service.store().backend().as_str()))
}

#[derive(Serialize)]
struct TablesResult {
    tables: Vec<String>,
}

pub async fn tables(service: &TabularQueryService, format: OutputFormat) -> Result<()> {
    let tables: Vec<String> = lift(service, service.get_all_tables().await)?
        .into_iter()
        .collect();

    if format.is_machine_readable() {
        return output::print_success(format, TablesResult { tables });
    }
    if tables.is_empty() {
        println!("No tables found.");
        return Ok(());
    }
    println!("{}", "Tables:".bold().cyan());
    for table in tables {
        println!("  {} {}", "•".cyan(), table.bold());
    }
    Ok(())
}

pub async fn schema(service: &TabularQueryService, table: &str, format: OutputFormat) -> Result<()> {
    let columns = lift(service, service.get_schema(table).await)?;

    if format.is_machine_readable() {
        return output::print_success(format, &columns);
    }
    if columns.is_empty() {
        println!("{} '{}'", "No columns found for table".yellow(), table);
        return Ok(());
    }
    println!("{} {}", "Table:".bold().cyan(), table.bold());
    let (headers, cells) = schema_table(&columns);
    output::print_table(&headers, &cells);
    Ok(())
}

pub async fn rows(
    service: &TabularQueryService,
    table: &str,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let rows = lift(service, service.get_all(table, limit).await)?;
    print_rows(&rows, format)
}

pub async fn filter(
    service: &TabularQueryService,
    table: &str,
    assignments: &[String],
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let filters = assignments
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let rows = lift(service, service.get_by_filter(table, &filters, limit).await)?;
    print_rows(&rows, format)
}

pub async fn range(
    service: &TabularQueryService,
    table: &str,
    column: &str,
    start: &str,
    end: &str,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let (start, end) = (parse_bound(start)?, parse_bound(end)?);
    let rows = lift(
        service,
        service
            .get_by_date_range(table, column, start, end, limit)
            .await,
    )?;
    print_rows(&rows, format)
}

pub async fn aggregate(
    service: &TabularQueryService,
    table: &str,
    group_by: &str,
    column: &str,
    function: &str,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let function: AggregateFunction = lift(service, function.parse())?;
    let rows = lift(
        service,
        service
            .get_aggregated(table, group_by, column, function, limit)
            .await,
    )?;
    print_rows(&rows, format)
}

pub async fn sql(
    service: &TabularQueryService,
    query: &str,
    params: &[String],
    format: OutputFormat,
) -> Result<()> {
    let params: Vec<SqlValue> = params.iter().map(|p| SqlValue::from_literal(p)).collect();
    let rows = lift(service, service.execute(query, &params).await)?;
    print_rows(&rows, format)
}

fn print_rows(rows: &ResultSet, format: OutputFormat) -> Result<()> {
    if format.is_machine_readable() {
        return output::print_success(format, rows);
    }
    let (headers, cells) = result_table(rows);
    output::print_table(&headers, &cells);
    Ok(())
}
