//! UB515 CLI: explore race result tables and print race reports.
//!
//! # Exploration
//!
//! - `tables`: List the tables of the configured store.
//! - `schema`: Describe the columns of one table.
//! - `rows`, `filter`, `range`, `aggregate`: Validated, parameterized reads.
//! - `sql`: Run a statement with bound `--param` values.
//!
//! # Reports
//!
//! - `report participation|ages|segments|top`: Statistics over the results,
//!   races and athletes tables.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use owo_colors::OwoColorize;
use tracing::debug;

mod commands;
mod config;
mod exit_codes;
mod output;

use commands::ReportKind;
use output::OutputFormat;
use ub515_common::config::{AppConfig, LoggingSettings, DEFAULT_CONFIG_PATH};
use ub515_common::logging::{init_logging, shutdown_logging};
use ub515_error::{ErrorCategory, Ub515Error};
use ub515_query::TabularQueryService;

#[derive(Parser)]
#[command(name = "ub515")]
#[command(about = "Query UB515 race results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (human, json, yaml)
    #[arg(long, global = true, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Configuration file; missing files are skipped
    #[arg(long, global = true, env = "UB515_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List available tables
    Tables,
    /// Show the columns of a table
    Schema {
        table: String,
    },
    /// Fetch rows of a table
    Rows {
        table: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Fetch rows matching every column=value filter
    Filter {
        table: String,
        /// Equality filter, repeatable (e.g. --where race_id=3)
        #[arg(long = "where", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Fetch rows whose date column lies between two bounds (inclusive)
    Range {
        table: String,
        column: String,
        /// YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS
        start: String,
        end: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Group rows and aggregate one column
    Aggregate {
        table: String,
        #[arg(long)]
        group_by: String,
        #[arg(long)]
        column: String,
        /// COUNT, SUM, AVG, MIN or MAX
        #[arg(long, default_value = "COUNT")]
        function: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Run a SQL statement with positional parameters
    Sql {
        query: String,
        /// Bound value, repeatable; `null` binds NULL, anything else binds as text
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// Race statistics
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
        /// Number of athletes for `top`
        #[arg(long)]
        count: Option<usize>,
        /// Reference date for `ages` (defaults to today)
        #[arg(long)]
        as_of: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    let cli = Cli::parse();

    // Logging comes up before validation so that config errors are reported
    // through the usual path.
    let logging = AppConfig::load_unvalidated(&cli.config)
        .map(|c| c.logging)
        .unwrap_or_else(|_| LoggingSettings::default());
    if let Err(e) = init_logging(&logging) {
        eprintln!("{} {:#}", "Warning:".yellow().bold(), e);
    }

    let result = run_cli(&cli).await;
    shutdown_logging();

    if let Err(e) = result {
        let exit_code = map_error_to_exit_code(&e);
        if cli.output.is_machine_readable() {
            output::print_error(
                cli.output,
                &e.to_string(),
                exit_code,
                e.downcast_ref::<Ub515Error>(),
            )
            .ok();
        } else {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
        std::process::exit(exit_code);
    }

    Ok(())
}

fn map_error_to_exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<Ub515Error>() {
        Some(err) => match err.category() {
            ErrorCategory::Connection => exit_codes::CONNECTION_ERROR,
            ErrorCategory::Config => exit_codes::CONFIG_ERROR,
            ErrorCategory::Query => exit_codes::VALIDATION_ERROR,
            ErrorCategory::Internal => exit_codes::GENERAL_ERROR,
            _ => exit_codes::GENERAL_ERROR,
        },
        None => exit_codes::GENERAL_ERROR,
    }
}

async fn run_cli(cli: &Cli) -> Result<(), anyhow::Error> {
    let config = config::load(&cli.config)?;
    debug!(store = %config.database.redacted_url(), "Using store");

    let service = TabularQueryService::from_config(&config)
        .map_err(|e| e.to_ub515_error(config.database.backend.as_str()))?;
    let format = cli.output;

    match &cli.command {
        Commands::Tables => commands::tables(&service, format).await?,
        Commands::Schema { table } => commands::schema(&service, table, format).await?,
        Commands::Rows { table, limit } => commands::rows(&service, table, *limit, format).await?,
        Commands::Filter {
            table,
            filters,
            limit,
        } => commands::filter(&service, table, filters, *limit, format).await?,
        Commands::Range {
            table,
            column,
            start,
            end,
            limit,
        } => commands::range(&service, table, column, start, end, *limit, format).await?,
        Commands::Aggregate {
            table,
            group_by,
            column,
            function,
            limit,
        } => {
            commands::aggregate(&service, table, group_by, column, function, *limit, format)
                .await?
        }
        Commands::Sql { query, params } => commands::sql(&service, query, params, format).await?,
        Commands::Report {
            kind,
            count,
            as_of,
        } => {
            let as_of = match as_of {
                Some(raw) => commands::parse_date(raw)?,
                None => chrono::Local::now().date_naive(),
            };
            commands::report(&service, &config.reports, *kind, *count, as_of, format).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ub515_error::ErrorCode;

    #[test]
    fn test_exit_codes_follow_error_category() {
        let code = |c: ErrorCode| map_error_to_exit_code(&anyhow::Error::new(Ub515Error::new(c, "x")));
        assert_eq!(code(ErrorCode::InvalidConfig), exit_codes::CONFIG_ERROR);
        assert_eq!(code(ErrorCode::ConnectionFailed), exit_codes::CONNECTION_ERROR);
        assert_eq!(code(ErrorCode::TableNotFound), exit_codes::VALIDATION_ERROR);
        assert_eq!(code(ErrorCode::InvalidIdentifier), exit_codes::VALIDATION_ERROR);
        assert_eq!(code(ErrorCode::InternalPanic), exit_codes::GENERAL_ERROR);
        assert_eq!(
            map_error_to_exit_code(&anyhow::anyhow!("something else")),
            exit_codes::GENERAL_ERROR
        );
    }

    #[test]
    fn test_cli_parses_repeated_filters() {
        let cli = Cli::try_parse_from([
            "ub515",
            "--output",
            "json",
            "filter",
            "athletes_results",
            "--where",
            "race_id=3",
            "--where",
            "athlete_id=1",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Filter {
                table,
                filters,
                limit,
            } => {
                assert_eq!(table, "athletes_results");
                assert_eq!(filters, vec!["race_id=3", "athlete_id=1"]);
                assert_eq!(limit, Some(5));
            }
            _ => panic!("expected filter command"),
        }
    }

    #[test]
    fn test_cli_parses_report_kind() {
        let cli = Cli::try_parse_from(["ub515", "report", "top", "--count", "3"]).unwrap();
        match cli.command {
            Commands::Report { kind, count, .. } => {
                assert_eq!(kind, ReportKind::Top);
                assert_eq!(count, Some(3));
            }
            _ => panic!("expected report command"),
        }
    }
}
