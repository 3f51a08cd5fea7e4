//! Aggregate views over [`RaceEntry`] lists.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::entries::{RaceEntry, Segment};
use crate::time::time_to_minutes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub participants: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeCount {
    pub age: i64,
    pub participants: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAverage {
    pub segment: Segment,
    pub average_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub athlete_id: i64,
    pub first_name: String,
    pub eternal_number: String,
    pub participations: usize,
}

/// Entries per race year, ascending. Entries without a race date are skipped.
pub fn participation_by_year(entries: &[RaceEntry]) -> Vec<YearCount> {
    let mut years: BTreeMap<i32, usize> = BTreeMap::new();
    for date in entries.iter().filter_map(|e| e.race_date) {
        *years.entry(date.year()).or_default() += 1;
    }
    years
        .into_iter()
        .map(|(year, participants)| YearCount { year, participants })
        .collect()
}

/// Entries per age in whole years on `as_of`, ascending. Age is elapsed days
/// divided by 365, floored; non-positive ages are dropped.
pub fn age_distribution(entries: &[RaceEntry], as_of: NaiveDate) -> Vec<AgeCount> {
    let mut ages: BTreeMap<i64, usize> = BTreeMap::new();
    for born in entries.iter().filter_map(|e| e.date_of_birth) {
        let age = (as_of - born).num_days().div_euclid(365);
        if age > 0 {
            *ages.entry(age).or_default() += 1;
        }
    }
    ages.into_iter()
        .map(|(age, participants)| AgeCount { age, participants })
        .collect()
}

/// Mean time in minutes per segment over parseable times, in course order.
/// Segments with no usable time are left out.
pub fn average_segment_times(entries: &[RaceEntry]) -> Vec<SegmentAverage> {
    Segment::ALL
        .iter()
        .filter_map(|&segment| {
            let minutes: Vec<f64> = entries
                .iter()
                .filter_map(|e| e.time(segment).and_then(time_to_minutes))
                .collect();
            if minutes.is_empty() {
                return None;
            }
            Some(SegmentAverage {
                segment,
                average_minutes: minutes.iter().sum::<f64>() / minutes.len() as f64,
            })
        })
        .collect()
}

/// The `n` athletes with the most entries, ties broken by athlete id.
/// Entries missing the athlete id, first name or eternal number are not
/// counted.
pub fn top_participants(entries: &[RaceEntry], n: usize) -> Vec<Participant> {
    let mut counts: HashMap<(i64, &str, &str), usize> = HashMap::new();
    for entry in entries {
        if let (Some(id), Some(name), Some(number)) = (
            entry.athlete_id,
            entry.first_name.as_deref(),
            entry.eternal_number.as_deref(),
        ) {
            *counts.entry((id, name, number)).or_default() += 1;
        }
    }

    let mut ranked: Vec<Participant> = counts
        .into_iter()
        .map(|((athlete_id, name, number), participations)| Participant {
            athlete_id,
            first_name: name.to_string(),
            eternal_number: number.to_string(),
            participations,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.participations
            .cmp(&a.participations)
            .then_with(|| a.athlete_id.cmp(&b.athlete_id))
            .then_with(|| a.first_name.cmp(&b.first_name))
    });
    ranked.truncate(n);
    ranked
}
