use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use ub515_common::config::ReportSettings;
use ub515_query::{ResultRow, ResultSet, Scalar, TabularQueryService};

use crate::error::{ReportError, Result};

/// Timed segments of the race, in course order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Swim10km,
    Bike145km,
    Bike276km,
    Run84km,
    Overall,
}

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::Swim10km,
        Segment::Bike145km,
        Segment::Bike276km,
        Segment::Run84km,
        Segment::Overall,
    ];

    /// Column of the results table holding this segment's time.
    pub fn column(&self) -> &'static str {
        match self {
            Segment::Swim10km => "race_swim_10km_time",
            Segment::Bike145km => "race_bike_145km_time",
            Segment::Bike276km => "race_bike_276km_time",
            Segment::Run84km => "race_run_84km_time",
            Segment::Overall => "race_overall_time",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Swim10km => "Swim 10 km",
            Segment::Bike145km => "Bike 145 km",
            Segment::Bike276km => "Bike 276 km",
            Segment::Run84km => "Run 84 km",
            Segment::Overall => "Overall",
        }
    }
}

/// One result row joined with its race and athlete.
///
/// Fields coming from the race or athlete side are `None` when the
/// referenced row does not exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RaceEntry {
    pub athlete_id: Option<i64>,
    pub race_id: Option<i64>,
    pub race_date: Option<NaiveDate>,
    pub first_name: Option<String>,
    pub eternal_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub times: [Option<String>; 5],
}

impl RaceEntry {
    pub fn time(&self, segment: Segment) -> Option<&str> {
        let idx = Segment::ALL.iter().position(|s| *s == segment)?;
        self.times[idx].as_deref()
    }
}

/// Fetch results, races and athletes and join them into entries.
///
/// A table with more than `row_limit` rows fails with
/// [`ReportError::Truncated`] instead of yielding statistics over a prefix.
pub async fn load_entries(
    service: &TabularQueryService,
    settings: &ReportSettings,
) -> Result<Vec<RaceEntry>> {
    let row_limit = settings.row_limit;
    let fetch = |table: &str| {
        let table = table.to_string();
        async move {
            let rows = service
                .get_all(&table, Some(row_limit.saturating_add(1)))
                .await
                .map_err(|source| ReportError::Load {
                    table: table.clone(),
                    source,
                })?;
            if rows.len() > row_limit as usize {
                warn!(table = %table, row_limit, "Report table exceeds row limit");
                return Err(ReportError::Truncated {
                    table,
                    limit: row_limit,
                });
            }
            Ok::<_, ReportError>(rows)
        }
    };

    let results = fetch(&settings.results_table).await?;
    let races = fetch(&settings.races_table).await?;
    let athletes = fetch(&settings.athletes_table).await?;
    debug!(
        results = results.len(),
        races = races.len(),
        athletes = athletes.len(),
        "Fetched report tables"
    );

    require_columns(&settings.results_table, &results, &["athlete_id", "race_id"])?;
    require_columns(&settings.races_table, &races, &["id", "race_date"])?;
    require_columns(
        &settings.athletes_table,
        &athletes,
        &["id", "first_name", "eternal_number", "date_of_birth"],
    )?;

    let entries = join_entries(&results, &races, &athletes);
    info!(entries = entries.len(), "Built race entries");
    Ok(entries)
}

/// Left-join `results` to `races` on `race_id = id` and to `athletes` on
/// `athlete_id = id`.
pub fn join_entries(results: &ResultSet, races: &ResultSet, athletes: &ResultSet) -> Vec<RaceEntry> {
    let races = index_by_id(races);
    let athletes = index_by_id(athletes);

    results
        .iter()
        .map(|row| {
            let athlete_id = int(row, "athlete_id");
            let race_id = int(row, "race_id");
            let race = race_id.and_then(|id| races.get(&id));
            let athlete = athlete_id.and_then(|id| athletes.get(&id));

            RaceEntry {
                athlete_id,
                race_id,
                race_date: race.and_then(|r| date(r, "race_date")),
                first_name: athlete.and_then(|a| text(a, "first_name")),
                eternal_number: athlete.and_then(|a| text(a, "eternal_number")),
                date_of_birth: athlete.and_then(|a| date(a, "date_of_birth")),
                times: Segment::ALL.map(|s| text(row, s.column())),
            }
        })
        .collect()
}

fn require_columns(table: &str, rows: &ResultSet, columns: &[&str]) -> Result<()> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    match columns.iter().find(|c| first.get(c).is_none()) {
        Some(missing) => Err(ReportError::MissingColumn {
            table: table.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn index_by_id(rows: &ResultSet) -> HashMap<i64, &ResultRow> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        if let Some(id) = int(row, "id") {
            index.entry(id).or_insert(row);
        }
    }
    index
}

fn int(row: &ResultRow, column: &str) -> Option<i64> {
    row.get(column).and_then(Scalar::as_i64)
}

fn date(row: &ResultRow, column: &str) -> Option<NaiveDate> {
    row.get(column).and_then(Scalar::as_date)
}

fn text(row: &ResultRow, column: &str) -> Option<String> {
    match row.get(column)? {
        Scalar::Null => None,
        Scalar::Text(s) | Scalar::Duration(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
