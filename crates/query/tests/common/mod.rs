#![allow(dead_code)]

use anyhow::{Context, Result};
use std::sync::Arc;
use tempfile::TempDir;
use ub515_query::store::SqliteStore;
use ub515_query::TabularQueryService;

/// Tables as the results site lays them out; durations are stored as
/// microseconds, the way Django keeps `DurationField` on SQLite.
pub const SCHEMA: &str = "
CREATE TABLE athletes_race (
    id INTEGER PRIMARY KEY,
    race_edition TEXT NOT NULL,
    race_date DATE NOT NULL,
    race_location TEXT NOT NULL
);
CREATE TABLE athletes_athlete (
    id INTEGER PRIMARY KEY,
    complete_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    nickname TEXT,
    eternal_number TEXT NOT NULL,
    gender TEXT NOT NULL,
    date_of_birth DATE,
    city TEXT,
    club_id INTEGER
);
CREATE TABLE athletes_results (
    id INTEGER PRIMARY KEY,
    athlete_id INTEGER NOT NULL,
    race_id INTEGER NOT NULL,
    race_swim_10km_time INTERVAL,
    race_swim_10km_rank INTEGER,
    race_bike_145km_time INTERVAL,
    race_bike_145km_rank INTEGER,
    race_bike_276km_time INTERVAL,
    race_bike_276km_rank INTEGER,
    race_run_84km_time INTERVAL,
    race_run_84km_rank INTEGER,
    race_overall_time INTERVAL,
    race_overall_rank INTEGER
);
";

pub const DATA: &str = "
INSERT INTO athletes_race VALUES
    (1, 'UB515 2019', '2019-05-11', 'Ubatuba'),
    (2, 'UB515 2021', '2021-05-15', 'Ubatuba'),
    (3, 'UB515 2022', '2022-05-14', 'Paraty');

INSERT INTO athletes_athlete VALUES
    (1, 'Ana Souza', 'Ana', NULL, '101', 'F', '1985-02-28', 'Sao Paulo', NULL),
    (2, 'Bruno Lima', 'Bruno', 'Bru', '102', 'M', '1990-07-01', 'Ubatuba', 1),
    (3, 'Carla Dias', 'Carla', NULL, '103', 'F', '1978-11-20', 'Santos', 1);

INSERT INTO athletes_results VALUES
    (1, 1, 1, 14400000000, 3, 21600000000, 2, 36000000000, 1, 32400000000, 2, 104400000000, 2),
    (2, 2, 1, 12600000000, 1, 19800000000, 1, 37800000000, 2, 30600000000, 1, 100800000000, 1),
    (3, 1, 2, 5025500000, 1, 20000000000, 1, 35000000000, 1, 40000000000, 1, 100025500000, 1),
    (4, 3, 2, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL),
    (5, 1, 3, 13000000000, 2, 21000000000, 2, 36500000000, 2, 31000000000, 2, 101500000000, 2),
    (6, 2, 3, 12000000000, 1, 20500000000, 1, 36000000000, 1, 30000000000, 1, 98500000000, 1),
    (7, 3, 3, 15000000000, 3, 23000000000, 3, 39000000000, 3, 34000000000, 3, 111000000000, 3);
";

pub const RESULT_ROWS: usize = 7;

pub struct Fixture {
    // keeps the database file alive
    _dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub service: TabularQueryService,
}

pub async fn seeded() -> Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ub515.db");
    let store = Arc::new(SqliteStore::open(
        path.to_str().context("temp path is not UTF-8")?,
    )?);
    store.execute_batch(SCHEMA).await?;
    store.execute_batch(DATA).await?;

    let service = TabularQueryService::new(store.clone());
    Ok(Fixture {
        _dir: dir,
        store,
        service,
    })
}
