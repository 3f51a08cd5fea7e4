//! # ub515-reports
//!
//! Race statistics computed from the results, races and athletes tables:
//! participation per year, age distribution, average segment times and the
//! most frequent participants.
//!
//! Rows are read through [`ub515_query::TabularQueryService`], joined into
//! [`RaceEntry`] values and summarised in memory.

pub mod entries;
pub mod error;
pub mod stats;
pub mod time;

pub use entries::{join_entries, load_entries, RaceEntry, Segment};
pub use error::{ReportError, Result};
pub use stats::{
    age_distribution, average_segment_times, participation_by_year, top_participants, AgeCount,
    Participant, SegmentAverage, YearCount,
};
pub use time::{parse_hms, time_to_hours, time_to_minutes};
