use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use serde::Serialize;
use ub515_common::config::ReportSettings;
use ub515_query::TabularQueryService;
use ub515_reports::{
    age_distribution, average_segment_times, load_entries, participation_by_year,
    top_participants,
};

use crate::output::{self, OutputFormat};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    /// Entries per race year
    Participation,
    /// Participants per age
    Ages,
    /// Average minutes per race segment
    Segments,
    /// Athletes with the most entries
    Top,
}

pub async fn report(
    service: &TabularQueryService,
    settings: &ReportSettings,
    kind: ReportKind,
    count: Option<usize>,
    as_of: NaiveDate,
    format: OutputFormat,
) -> Result<()> {
    let backend = service.store().backend().as_str();
    let entries = load_entries(service, settings)
        .await
        .map_err(|e| e.to_ub515_error(backend))?;

    match kind {
        ReportKind::Participation => {
            let years = participation_by_year(&entries);
            let cells = years
                .iter()
                .map(|y| vec![y.year.to_string(), y.participants.to_string()])
                .collect();
            print_report("Participants by year", &["year", "participants"], cells, &years, format)
        }
        ReportKind::Ages => {
            let ages = age_distribution(&entries, as_of);
            let cells = ages
                .iter()
                .map(|a| vec![a.age.to_string(), a.participants.to_string()])
                .collect();
            print_report("Age distribution", &["age", "participants"], cells, &ages, format)
        }
        ReportKind::Segments => {
            let averages = average_segment_times(&entries);
            let cells = averages
                .iter()
                .map(|a| vec![a.segment.label().to_string(), format!("{:.1}", a.average_minutes)])
                .collect();
            print_report(
                "Average time by segment (minutes)",
                &["segment", "average_minutes"],
                cells,
                &averages,
                format,
            )
        }
        ReportKind::Top => {
            let top = top_participants(&entries, count.unwrap_or(settings.top_participants));
            let cells = top
                .iter()
                .map(|p| {
                    vec![
                        p.athlete_id.to_string(),
                        p.first_name.clone(),
                        p.eternal_number.clone(),
                        p.participations.to_string(),
                    ]
                })
                .collect();
            print_report(
                "Top athletes by participation",
                &["athlete_id", "first_name", "eternal_number", "participations"],
                cells,
                &top,
                format,
            )
        }
    }
}

fn print_report<T: Serialize>(
    title: &str,
    headers: &[&str],
    cells: Vec<Vec<String>>,
    data: &T,
    format: OutputFormat,
) -> Result<()> {
    if format.is_machine_readable() {
        return output::print_success(format, data);
    }
    println!("{}", title.bold().cyan());
    let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    output::print_table(&headers, &cells);
    Ok(())
}
