//! Structured output handling for CLI commands.

use owo_colors::OwoColorize;
use serde::Serialize;

/// Cells wider than this are cut with `...` in human output.
const MAX_CELL_WIDTH: usize = 40;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq, Copy)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Returns true if the output format is intended for machine consumption
    pub fn is_machine_readable(&self) -> bool {
        match self {
            OutputFormat::Human => false,
            OutputFormat::Json | OutputFormat::Yaml => true,
        }
    }
}

/// Envelope for JSON/YAML responses
#[derive(Serialize)]
pub struct CommandResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> CommandResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            exit_code: None,
            data: Some(data),
        }
    }

    pub fn error(message: String, exit_code: i32, data: Option<T>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message),
            exit_code: Some(exit_code),
            data,
        }
    }
}

/// Print the output to stdout in the requested format
pub fn print_output<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => {}
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&data)?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&data)?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Print a structured success response for machine outputs
pub fn print_success<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }
    print_output(format, CommandResponse::success(data))
}

/// Print a structured error response for machine outputs. `details` is the
/// serialized `Ub515Error` when one is available.
pub fn print_error<T: Serialize>(
    format: OutputFormat,
    message: &str,
    exit_code: i32,
    details: Option<T>,
) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }
    print_output(
        format,
        CommandResponse::error(message.to_string(), exit_code, details),
    )
}

fn truncate(value: &str, max_width: usize) -> String {
    if value.chars().count() <= max_width {
        value.to_string()
    } else if max_width <= 3 {
        value.chars().take(max_width).collect()
    } else {
        format!("{}...", value.chars().take(max_width - 3).collect::<String>())
    }
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut line = String::new();
    line.push(left);
    for (idx, width) in widths.iter().enumerate() {
        line.push_str(&"─".repeat(width + 2));
        line.push(if idx == widths.len() - 1 { right } else { mid });
    }
    line
}

fn row_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("│");
    for (cell, width) in cells.iter().zip(widths) {
        let pad = width.saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad));
        line.push_str(" │");
    }
    line
}

/// Render `rows` under `headers` as a box-drawn table, without colour.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let headers: Vec<String> = headers.iter().map(|h| truncate(h, MAX_CELL_WIDTH)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| truncate(c, MAX_CELL_WIDTH)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = vec![
        border(&widths, '┌', '┬', '┐'),
        row_line(&headers, &widths),
        border(&widths, '├', '┼', '┤'),
    ];
    out.extend(rows.iter().map(|r| row_line(r, &widths)));
    out.push(border(&widths, '└', '┴', '┘'));
    out.join("\n")
}

/// Print a table followed by a dimmed row count.
pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("{}", "(0 rows)".dimmed());
        return;
    }
    println!("{}", render_table(headers, rows));
    let noun = if rows.len() == 1 { "row" } else { "rows" };
    println!("{}", format!("({} {})", rows.len(), noun).dimmed());
}
